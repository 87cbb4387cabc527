//! System and context prompts for the assistant.
//!
//! Prompts are built next to the code that uses them: every builder
//! interpolates retrieved context, so file-based templates would only
//! scatter the format strings.

/// Base system prompt for all answer generation.
pub const SYSTEM_PROMPT: &str = "You are a helpful HR assistant. \
You answer questions about employment policies, labor laws in Germany, \
and HR related topics using the provided reference material. \
You also manage personal memories for the user: when asked to remember \
something you store it and confirm the result. \
If the retrieved data does not contain the answer, state clearly that the \
requested information is not available in the stored data, then answer \
from your general knowledge and say that it is your best general \
knowledge answer.";

/// One-word classification prompt for query routing.
pub const ROUTER_PROMPT: &str = "Classify the user message into exactly one category. \
Reply with one word and nothing else.\n\
Categories:\n\
- store_memory: the user shares a personal fact, preference or interest to remember\n\
- retrieve_memory: the user asks about their own previously shared facts, growth or interests\n\
- retrieve_knowledge: the user asks about employment policies, labor law or other HR topics";

/// Prompt for answering from retrieved policy context.
pub fn build_knowledge_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using the reference excerpts below.\n\
         If the excerpts do not contain the answer, say so explicitly before \
         falling back to general knowledge.\n\n\
         Reference excerpts:\n{}\n\nQuestion: {}",
        context, question
    )
}

/// Prompt for answering from the user's stored memories.
pub fn build_memory_prompt(question: &str, memories: &str) -> String {
    format!(
        "Answer the question using the user's stored memories below.\n\
         If the memories do not contain the answer, say that nothing relevant \
         is stored for this user.\n\n\
         Stored memories:\n{}\n\nQuestion: {}",
        memories, question
    )
}

/// Prompt confirming a stored memory back to the user.
pub fn build_store_confirmation_prompt(fact: &str) -> String {
    format!(
        "The following has just been saved to the user's personal memory:\n\
         \"{}\"\n\
         Confirm to the user in one or two sentences what was remembered.",
        fact
    )
}

/// Router user message wrapping the raw question.
pub fn build_router_message(question: &str) -> String {
    format!("User message: {}", question)
}

/// Placeholder block used when retrieval returns nothing.
pub const EMPTY_CONTEXT: &str = "(no matching excerpts found)";

/// Placeholder block used when the user has no stored memories.
pub const EMPTY_MEMORIES: &str = "(no stored memories for this user)";

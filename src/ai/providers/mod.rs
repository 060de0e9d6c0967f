pub(crate) mod ollama;
pub(crate) mod openai;

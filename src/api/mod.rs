pub mod drive;
pub mod gemini;
pub mod google_auth;
pub mod kieai;
pub mod openai;
pub mod sheets;
pub mod voicevox;
pub mod youtube;

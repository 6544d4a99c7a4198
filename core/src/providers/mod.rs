pub mod factory;
pub mod groq;

pub use factory::create_provider;
pub use groq::GroqProvider;

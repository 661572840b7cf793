mod redact;
mod value;

pub use redact::Redactor;
pub use value::SecretValue;

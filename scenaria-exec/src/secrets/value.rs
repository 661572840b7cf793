use std::sync::Arc;

use zeroize::Zeroizing;

/// Secret text that is not `Debug` printable and is zeroized on drop.
#[derive(Clone)]
pub struct SecretValue(Arc<Zeroizing<String>>);

impl SecretValue {
    pub fn new(s: String) -> Self {
        Self(Arc::new(Zeroizing::new(s)))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

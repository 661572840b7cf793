use std::fmt;
use std::sync::OnceLock;

use super::{Env, Template};
use crate::error::{Error, ErrorPhase};
use crate::value::Value;

/// A template waiting for the actual value bound to `$`.
///
/// Each [`Lazy::start`] begins an independent resolution, so one expected
/// value can be checked against many actual values (e.g. by `contains`).
#[derive(Clone)]
pub struct Lazy {
    template: Template,
    env: Env,
}

impl Lazy {
    pub(crate) fn new(template: Template, env: Env) -> Self {
        Self { template, env }
    }

    pub fn source(&self) -> &str {
        self.template.source()
    }

    pub fn start(&self) -> LazyResolution {
        LazyResolution {
            lazy: self.clone(),
            actual: OnceLock::new(),
        }
    }

    /// Shorthand for a fresh resolution supplied once with `actual`.
    pub fn resolve(&self, actual: Value) -> Result<Value, Error> {
        self.start().supply(actual)
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lazy").field(&self.template.source()).finish()
    }
}

/// One resolution of a [`Lazy`]. The actual value can be supplied only once and
/// every `$` in the template observes that same value.
pub struct LazyResolution {
    lazy: Lazy,
    actual: OnceLock<Value>,
}

impl LazyResolution {
    pub fn supply(&self, actual: Value) -> Result<Value, Error> {
        self.actual
            .set(actual)
            .map_err(|_| Error::new("the actual value has already been supplied"))?;
        if self.lazy.env.cancel().is_cancelled() {
            return Err(Error::new("context canceled").with_phase(ErrorPhase::Timeout));
        }
        let actual = self.actual.get().cloned().unwrap_or(Value::Nil);
        let env = self.lazy.env.clone().with_dollar(actual);
        self.lazy.template.execute(&env)
    }

    pub fn supplied(&self) -> Option<&Value> {
        self.actual.get()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::value::Map;

    fn lazy(src: &str, cancel: CancellationToken) -> Lazy {
        let env = Env::new(Arc::new(Map::new())).with_cancel(cancel);
        match Template::parse(src).unwrap().execute(&env).unwrap() {
            Value::Lazy(l) => l,
            other => panic!("expected lazy, got {other:?}"),
        }
    }

    #[test]
    fn second_supply_is_rejected() {
        let l = lazy("{{$ + $}}", CancellationToken::new());
        let r = l.start();
        assert_eq!(r.supply(Value::Int(2)).unwrap(), Value::Int(4));
        assert!(r.supply(Value::Int(3)).is_err());
        assert_eq!(r.supplied(), Some(&Value::Int(2)));
    }

    #[test]
    fn matches_eager_substitution() {
        let l = lazy("got {{$}}!", CancellationToken::new());
        assert_eq!(l.resolve(Value::Int(7)).unwrap(), Value::from("got 7!"));
    }

    #[test]
    fn cancellation_unblocks_with_error() {
        let token = CancellationToken::new();
        let l = lazy("{{$}}", token.clone());
        token.cancel();
        let err = l.resolve(Value::Int(1)).unwrap_err();
        assert_eq!(err.phase(), Some(ErrorPhase::Timeout));
    }
}

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::{HostObject, Type, TypeRegistry, Value};
use crate::error::Error;
use crate::template::ArgDecoder;

/// Parameter types of a callable. `variadic` types every argument past `params`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub variadic: Option<Type>,
}

impl Signature {
    pub fn new(params: impl Into<Vec<Type>>) -> Self {
        Self {
            params: params.into(),
            variadic: None,
        }
    }

    pub fn variadic(params: impl Into<Vec<Type>>, rest: Type) -> Self {
        Self {
            params: params.into(),
            variadic: Some(rest),
        }
    }

    fn check(&self, name: &str, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let fixed = self.params.len();
        let arity_ok = match self.variadic {
            Some(_) => args.len() >= fixed,
            None => args.len() == fixed,
        };
        if !arity_ok {
            let want = match self.variadic {
                Some(_) => format!("at least {fixed}"),
                None => fixed.to_string(),
            };
            return Err(Error::new(format!(
                "expected function argument length is {want} but got {}",
                args.len()
            )));
        }
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| {
                let ty = self
                    .params
                    .get(i)
                    .copied()
                    .or(self.variadic)
                    .unwrap_or(Type::Any);
                if ty.accepts(&arg) {
                    return Ok(arg);
                }
                ty.convert(&arg).map_err(|_| {
                    Error::new(format!("can't use {arg} as {ty} in arguments[{i}] to {name}"))
                })
            })
            .collect()
    }
}

type NativeBody = dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync;

/// A host function exposed to templates.
pub struct NativeFn {
    name: String,
    signature: Signature,
    body: Box<NativeBody>,
}

impl NativeFn {
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// A function usable as a left-arrow key: `{fn <-}: arg`.
pub trait TemplateFunc: Send + Sync {
    fn name(&self) -> &str;

    /// Decodes the rendered argument document.
    fn unmarshal_arg(&self, decoder: &ArgDecoder) -> Result<Value, Error> {
        decoder.decode()
    }

    fn exec(&self, arg: Value) -> Result<Value, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Convert(Type),
    TypeOf,
    Size,
}

#[derive(Clone)]
pub enum Callable {
    Builtin(Builtin),
    Native(Arc<NativeFn>),
    Method {
        receiver: Arc<dyn HostObject>,
        name: String,
    },
    Template(Arc<dyn TemplateFunc>),
}

impl Callable {
    pub fn native<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Callable::Native(Arc::new(NativeFn::new(name, signature, body)))
    }

    pub fn name(&self) -> String {
        match self {
            Callable::Builtin(Builtin::Convert(t)) => t.name().to_string(),
            Callable::Builtin(Builtin::TypeOf) => "type".to_string(),
            Callable::Builtin(Builtin::Size) => "size".to_string(),
            Callable::Native(f) => f.name.clone(),
            Callable::Method { receiver, name } => format!("{}.{name}", receiver.type_name()),
            Callable::Template(f) => f.name().to_string(),
        }
    }

    /// Calls with arity checking and argument conversion. Panics raised by host
    /// functions are caught and reported as errors.
    pub fn call(&self, args: Vec<Value>, types: &TypeRegistry) -> Result<Value, Error> {
        let name = self.name();
        match self {
            Callable::Builtin(b) => {
                let [arg]: [Value; 1] = args.try_into().map_err(|args: Vec<Value>| {
                    Error::new(format!(
                        "expected function argument length is 1 but got {}",
                        args.len()
                    ))
                })?;
                match b {
                    Builtin::Convert(t) => t.convert(&arg).map_err(|e| Error::new(e.to_string())),
                    Builtin::TypeOf => Ok(Value::String(types.type_name(&arg))),
                    Builtin::Size => arg
                        .size()
                        .map(|n| Value::Int(n as i64))
                        .map_err(|e| Error::new(e.to_string())),
                }
            }
            Callable::Native(f) => {
                let args = f.signature.check(&name, args)?;
                guard(&name, || (f.body)(args))
            }
            Callable::Method { receiver, name: method } => {
                let signature = receiver
                    .method_signature(method)
                    .ok_or_else(|| Error::new(format!("method {name} not found")))?;
                let args = signature.check(&name, args)?;
                guard(&name, || receiver.call_method(method, args))
            }
            Callable::Template(f) => {
                let arg = match args.len() {
                    1 => args.into_iter().next().unwrap_or(Value::Nil),
                    _ => Value::Seq(args),
                };
                let arg = f.unmarshal_arg(&ArgDecoder::from_value(arg))?;
                f.exec(arg)
            }
        }
    }
}

fn guard(name: &str, f: impl FnOnce() -> Result<Value, String>) -> Result<Value, Error> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(msg)) => Err(Error::new(msg)),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::new(format!("{name}: panic: {msg}")))
        }
    }
}

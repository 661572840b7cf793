#![forbid(unsafe_code)]

pub mod assert;
pub mod error;
pub mod ordered_map;
pub mod query;
pub mod scenario;
pub mod template;
pub mod value;

pub use crate::assert::Assertion;
pub use crate::error::{Error, ErrorPhase, ParseError, ValidationError};
pub use crate::ordered_map::OrderedMap;
pub use crate::query::Query;
pub use crate::scenario::{parse_file, parse_str, Scenario, Step};
pub use crate::template::{execute_value, Env, Lazy, Lookup, Template};
pub use crate::value::{Map, Type, TypeRegistry, Value};

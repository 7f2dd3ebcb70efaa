/// Type reference resolution module.
///
/// Binds raw type references (bare, partially qualified or fully qualified
/// names) to declared entities, preferring the declaration in the nearest
/// enclosing namespace.
mod resolver;

pub use resolver::{ReferenceResolver, Resolution};

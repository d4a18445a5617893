//! Validation and signature synthesis for additional service methods.
//!
//! The generator only handles one native method shape:
//!
//! ```text
//! Method(receiver, project, [region|zone,] name, extra...) -> *XxxCall
//! XxxCall.Do() -> (*Operation, error) | error
//! ```
//!
//! The leading scope parameters are elided and replaced by a canonical
//! `(ctx, key)` prefix in every synthesized signature.

use super::schema::{MethodDef, TierSchema, TypeRef};
use super::service::{snake_case, ServiceInfo};
use super::{GenerationError, KeyType};

/// Suffix every call handle type name must carry.
pub const HANDLE_SUFFIX: &str = "Call";
/// Completion method every call handle must expose.
pub const COMPLETION_METHOD: &str = "Do";
/// Native name of the pending-work record type.
pub const OPERATION_TYPE: &str = "Operation";
/// HTTP verbs the REST transport dispatches with.
pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// A native parameter type, dereferenced down to its concrete type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub pkg: String,
    pub type_name: String,
    pub num_ptr: usize,
}

impl From<&TypeRef> for Arg {
    fn from(t: &TypeRef) -> Self {
        Self {
            pkg: t.package.clone(),
            type_name: t.name.clone(),
            num_ptr: t.pointers,
        }
    }
}

impl Arg {
    /// Module prefix for the argument's package (`ga::`, `alpha::`, `beta::`),
    /// ignoring any vendoring prefix in the package path.
    pub fn normalized_pkg(&self) -> Result<&'static str, GenerationError> {
        if self.pkg.is_empty() {
            return Ok("");
        }

        let parts: Vec<&str> = self.pkg.split('/').collect();
        let parts = match parts.iter().position(|p| *p == "vendor") {
            Some(i) => &parts[i + 1..],
            None => &parts[..],
        };
        match parts.join("/").as_str() {
            "google.golang.org/api/compute/v1" => Ok("ga::"),
            "google.golang.org/api/compute/v0.alpha" => Ok("alpha::"),
            "google.golang.org/api/compute/v0.beta" => Ok("beta::"),
            _ => Err(GenerationError::UnknownPackage(self.pkg.clone())),
        }
    }

    /// Rust spelling of the type: one `&` per pointer level, builtins mapped.
    pub fn render(&self) -> Result<String, GenerationError> {
        let base = match (self.pkg.as_str(), self.type_name.as_str()) {
            ("", "string") => "String".to_string(),
            ("", "bool") => "bool".to_string(),
            ("", "int64") => "i64".to_string(),
            ("", other) => other.to_string(),
            _ => format!("{}{}", self.normalized_pkg()?, self.type_name),
        };
        Ok(format!("{}{}", "&".repeat(self.num_ptr), base))
    }
}

/// What the completion method of a call handle yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// `Do() -> error`
    Error,
    /// `Do() -> (*Operation, error)`; the operation is awaited.
    Operation,
}

/// A native argument remaining after the scope prefix is elided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArg {
    /// Parameter name in the native schema
    pub name: String,
    pub arg: Arg,
    /// Rust spelling of the type
    pub rendered: String,
}

impl NativeArg {
    /// Pointer arguments travel as the request body, the rest as query
    /// parameters.
    pub fn is_body(&self) -> bool {
        self.arg.num_ptr > 0
    }
}

/// A validated additional method of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub service: String,
    pub mock_wrap_type: String,
    pub key_type: KeyType,
    name: String,
    arity: usize,
    args: Vec<NativeArg>,
    pub return_shape: ReturnShape,
    pub http_method: String,
    pub verb: String,
}

impl Method {
    /// Build a method from its native definition; fails if the shape is
    /// not supported.
    pub fn new(
        info: &ServiceInfo,
        def: &MethodDef,
        schema: &TierSchema,
    ) -> Result<Self, GenerationError> {
        let skip = info.key_type.args_skip();
        let return_shape = sanity_check(info, def, schema)?;

        let args = def.params[skip..]
            .iter()
            .map(|p| {
                let arg = Arg::from(&p.ty);
                Ok(NativeArg {
                    name: p.name.clone(),
                    rendered: arg.render()?,
                    arg,
                })
            })
            .collect::<Result<Vec<_>, GenerationError>>()?;

        Ok(Self {
            service: info.service.clone(),
            mock_wrap_type: info.mock_wrap_type(),
            key_type: info.key_type,
            name: def.name.clone(),
            arity: def.params.len(),
            args,
            return_shape,
            http_method: def.http_method.clone(),
            verb: def.verb.clone(),
        })
    }

    /// Native method name, e.g. `SetUrlMap`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust method name, e.g. `set_url_map`.
    pub fn fn_name(&self) -> String {
        snake_case(&self.name)
    }

    /// Number of native parameters including the elided scope prefix.
    pub fn native_arity(&self) -> usize {
        self.arity
    }

    /// Arguments after the scope prefix.
    pub fn native_args(&self) -> &[NativeArg] {
        &self.args
    }

    /// Argument list with the canonical prefix. `named` adds `argN` names.
    pub fn args(&self, named: bool, prefix: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
        for (i, a) in self.args.iter().enumerate() {
            if named {
                out.push(format!("arg{}: {}", i, a.rendered));
            } else {
                out.push(a.rendered.clone());
            }
        }
        out
    }

    /// `, arg0, arg1` or empty.
    pub fn call_args(&self) -> String {
        self.args
            .iter()
            .enumerate()
            .map(|(i, _)| format!(", arg{}", i))
            .collect()
    }

    pub fn mock_hook_name(&self) -> String {
        format!("{}_hook", self.fn_name())
    }

    /// Hook field declaration for the mock wrapper.
    pub fn mock_hook(&self) -> String {
        let receiver = format!("&{}", self.mock_wrap_type);
        let args = self.args(false, &[receiver.as_str(), "&Context", "&meta::Key"]);
        format!(
            "{}: Option<Box<dyn Fn({}) -> Result<(), Error> + Send + Sync>>",
            self.mock_hook_name(),
            args.join(", ")
        )
    }

    /// Trait method signature (shared by the trait, production and mock impls).
    pub fn interface_func(&self) -> String {
        let args = self.args(true, &["&self", "ctx: &Context", "key: &meta::Key"]);
        format!("async fn {}({}) -> Result<(), Error>", self.fn_name(), args.join(", "))
    }
}

/// Check that `def` has the single shape the generator supports.
pub fn sanity_check(
    info: &ServiceInfo,
    def: &MethodDef,
    schema: &TierSchema,
) -> Result<ReturnShape, GenerationError> {
    let skip = info.key_type.args_skip();
    let err_ctx = || (info.service.clone(), def.name.clone());

    if def.params.len() < skip {
        let (service, method) = err_ctx();
        return Err(GenerationError::Arity {
            service,
            method,
            arity: def.params.len(),
            required: skip,
        });
    }
    // Skipped args (project, region/zone, name) must all be strings.
    for (index, p) in def.params.iter().enumerate().take(skip).skip(1) {
        if !p.ty.is_string() {
            let (service, method) = err_ctx();
            return Err(GenerationError::NonStringScopeArg {
                service,
                method,
                index,
                found: p.ty.describe(),
            });
        }
    }

    // Pointer args become the request body, which holds at most one object.
    let bodies = def.params[skip..].iter().filter(|p| p.ty.pointers > 0).count();
    if !HTTP_METHODS.contains(&def.http_method.as_str()) || bodies > 1 {
        let (service, method) = err_ctx();
        let reason = if bodies > 1 {
            format!("{} body arguments", bodies)
        } else {
            format!("unsupported HTTP method {:?}", def.http_method)
        };
        return Err(GenerationError::Dispatch {
            service,
            method,
            reason,
        });
    }

    let handle_ref = match def.returns.as_slice() {
        [r] if r.pointers > 0 && r.name.ends_with(HANDLE_SUFFIX) => r,
        _ => {
            let (service, method) = err_ctx();
            return Err(GenerationError::ReturnShape { service, method });
        }
    };

    let completion = schema
        .handle(&handle_ref.name)
        .and_then(|h| h.method(COMPLETION_METHOD))
        .ok_or_else(|| {
            let (service, method) = err_ctx();
            GenerationError::MissingCompletion {
                service,
                method,
                handle: handle_ref.name.clone(),
                completion: COMPLETION_METHOD.to_string(),
            }
        })?;

    match completion.results.as_slice() {
        [e] if e.is_error() => Ok(ReturnShape::Error),
        [op, e] if op.pointers == 1 && op.name == OPERATION_TYPE && e.is_error() => {
            tracing::debug!("Method {}.{} is an Operation", info.service, def.name);
            Ok(ReturnShape::Operation)
        }
        other => {
            let (service, method) = err_ctx();
            let found = other.iter().map(TypeRef::describe).collect::<Vec<_>>().join(", ");
            Err(GenerationError::CompletionResult {
                service,
                method,
                handle: handle_ref.name.clone(),
                completion: COMPLETION_METHOD.to_string(),
                found: format!("({})", found),
            })
        }
    }
}

//! Source file parser that extracts mapping units and type descriptors.
//!
//! Every `struct` and `enum` in a scanned file is registered as a
//! [`TypeDescriptor`](crate::TypeDescriptor), and inherent `impl` blocks add
//! their `self` methods to it. Traits annotated with `#[mapper]` become
//! [`MappingUnit`]s.
//!
//! ## Use-item analysis
//!
//! The extractor processes `use` statements in each source file to build a
//! mapping from local names to fully-qualified paths:
//!
//! - `use mapper_derive::mapper` maps `"mapper"` to `"mapper_derive::mapper"`,
//!   so a bare `#[mapper]` is recognized as the marker
//! - `use mapper_codegen::mapper as map_to` makes `#[map_to]` the marker
//! - `use crate::model::StudentEntity as Entity` makes a parameter of type
//!   `&Entity` look up the `StudentEntity` descriptor

use crate::CodeGenerator;
use crate::error::{Error, MalformedReason, MalformedUnit, Result};
use crate::types::{
    FunctionKind, MappingFunction, MappingUnit, MethodSig, ModuleId, Param, Passing, Receiver,
    TypeRef,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use syn::{
    Attribute, Expr, FnArg, GenericArgument, ImplItem, Item, ItemImpl, ItemStruct, ItemTrait,
    Pat, PathArguments, ReturnType, Signature, TraitItem, TraitItemFn, Type, TypeParamBound,
    TypePath, UseTree, Visibility,
};
use walkdir::WalkDir;

/// Fully-qualified paths of the marker attribute.
const MARKERS: &[&str] = &["mapper_derive::mapper", "mapper_codegen::mapper"];

/// Per-scope context built from `use` items.
#[derive(Debug, Clone)]
struct SourceContext {
    module: ModuleId,
    /// Maps local name -> fully-qualified path. Glob imports are not tracked.
    imports: HashMap<String, String>,
}

impl SourceContext {
    fn new(module: ModuleId, items: &[Item]) -> Self {
        let mut ctx = Self {
            module,
            imports: HashMap::new(),
        };
        ctx.collect(items);
        ctx
    }

    /// Context for an inline `mod` block: the parent's imports plus its own.
    fn nested(&self, items: &[Item]) -> Self {
        let mut ctx = self.clone();
        ctx.collect(items);
        ctx
    }

    fn collect(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Use(item_use) => collect_imports(&item_use.tree, &[], &mut self.imports),
                // `type Foo = some::path::Bar` maps "Foo" to "some::path::Bar"
                Item::Type(item_type) => {
                    if let Type::Path(TypePath { path, .. }) = &*item_type.ty
                        && path.segments.len() > 1
                    {
                        let full_path = path
                            .segments
                            .iter()
                            .map(|s| s.ident.to_string())
                            .collect::<Vec<_>>()
                            .join("::");
                        self.imports.insert(item_type.ident.to_string(), full_path);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Recursively flatten a `UseTree` into import entries.
fn collect_imports(tree: &UseTree, prefix: &[String], imports: &mut HashMap<String, String>) {
    match tree {
        UseTree::Path(p) => {
            let mut new_prefix = prefix.to_vec();
            new_prefix.push(p.ident.to_string());
            collect_imports(&p.tree, &new_prefix, imports);
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            let full_path = make_full_path(prefix, &name);
            imports.insert(name, full_path);
        }
        UseTree::Rename(r) => {
            let full_path = make_full_path(prefix, &r.ident.to_string());
            imports.insert(r.rename.to_string(), full_path);
        }
        UseTree::Glob(_) => {}
        UseTree::Group(g) => {
            for item in &g.items {
                collect_imports(item, prefix, imports);
            }
        }
    }
}

fn make_full_path(prefix: &[String], name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", prefix.join("::"), name)
    }
}

/// Find the `#[mapper]` attribute.
///
/// Recognizes:
/// - `#[mapper]` when `use mapper_derive::mapper` or `use mapper_codegen::mapper` is in scope
/// - `#[map_to]` when one of them is imported `as map_to`
/// - any qualified path ending in `::mapper`
fn marker_attr<'a>(attrs: &'a [Attribute], ctx: &SourceContext) -> Option<&'a Attribute> {
    attrs.iter().find(|attr| {
        let path = attr.path();
        if path.segments.len() == 1 {
            let ident = path.segments[0].ident.to_string();
            ctx.imports
                .get(&ident)
                .is_some_and(|p| MARKERS.contains(&p.as_str()))
        } else {
            path.segments.last().is_some_and(|s| s.ident == "mapper")
        }
    })
}

#[derive(Debug, Default)]
struct MarkerArgs {
    generate_wrapper: bool,
    base: Option<syn::Path>,
    impl_name: Option<String>,
}

/// Parse `#[mapper(generate_wrapper, base = Deps, impl_name = Name)]`.
fn parse_marker_args(attr: &Attribute) -> syn::Result<MarkerArgs> {
    let mut args = MarkerArgs::default();
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(args);
    }
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("generate_wrapper") {
            args.generate_wrapper = if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<syn::LitBool>()?.value
            } else {
                true
            };
            Ok(())
        } else if meta.path.is_ident("base") {
            args.base = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("impl_name") {
            args.impl_name = Some(meta.value()?.parse::<syn::Ident>()?.to_string());
            Ok(())
        } else {
            Err(meta.error("expected `generate_wrapper`, `base` or `impl_name`"))
        }
    })?;
    Ok(args)
}

/// The registry key for a path: its last segment, resolved through imports.
fn lookup_name(path: &syn::Path, ctx: &SourceContext) -> String {
    let Some(last) = path.segments.last() else {
        return String::new();
    };
    let ident = last.ident.to_string();
    if path.segments.len() == 1
        && let Some(full_path) = ctx.imports.get(&ident)
    {
        return full_path.rsplit("::").next().unwrap_or(full_path).to_string();
    }
    ident
}

/// Convert a syn type to a [`TypeRef`], splitting off the outer reference.
fn type_ref(ty: &Type, ctx: &SourceContext) -> std::result::Result<TypeRef, String> {
    let (elem, passing) = match ty {
        Type::Reference(r) if r.mutability.is_some() => (&*r.elem, Passing::Exclusive),
        Type::Reference(r) => (&*r.elem, Passing::Shared),
        other => (other, Passing::Owned),
    };
    let source = render_type(elem)?;
    let name = match elem {
        Type::Path(TypePath { qself: None, path }) => lookup_name(path, ctx),
        _ => source.clone(),
    };
    Ok(TypeRef {
        name,
        source,
        passing,
    })
}

/// Render a type back to source text.
fn render_type(ty: &Type) -> std::result::Result<String, String> {
    match ty {
        Type::Path(TypePath { qself: None, path }) => render_path(path),
        Type::Reference(r) => {
            let lifetime = r
                .lifetime
                .as_ref()
                .map(|l| format!("{l} "))
                .unwrap_or_default();
            let mutability = if r.mutability.is_some() { "mut " } else { "" };
            Ok(format!("&{lifetime}{mutability}{}", render_type(&r.elem)?))
        }
        Type::Tuple(t) => {
            let elems = t
                .elems
                .iter()
                .map(render_type)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(if elems.len() == 1 {
                format!("({},)", elems[0])
            } else {
                format!("({})", elems.join(", "))
            })
        }
        Type::Array(a) => Ok(format!("[{}; {}]", render_type(&a.elem)?, render_expr(&a.len)?)),
        Type::Slice(s) => Ok(format!("[{}]", render_type(&s.elem)?)),
        Type::Paren(p) => Ok(format!("({})", render_type(&p.elem)?)),
        Type::Group(g) => render_type(&g.elem),
        Type::Ptr(p) => {
            let kind = if p.mutability.is_some() { "mut" } else { "const" };
            Ok(format!("*{kind} {}", render_type(&p.elem)?))
        }
        Type::Never(_) => Ok("!".to_string()),
        Type::TraitObject(t) => Ok(format!("dyn {}", render_bounds(t.bounds.iter())?)),
        Type::ImplTrait(t) => Ok(format!("impl {}", render_bounds(t.bounds.iter())?)),
        Type::BareFn(f) => {
            if f.unsafety.is_some() || f.abi.is_some() || f.lifetimes.is_some() {
                return Err("`unsafe`, `extern` or higher-ranked fn pointers".to_string());
            }
            let inputs = f
                .inputs
                .iter()
                .map(|arg| render_type(&arg.ty))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(format!("fn({}){}", inputs.join(", "), render_return(&f.output)?))
        }
        Type::Path(_) => Err("qualified `<T as Trait>` paths".to_string()),
        Type::Infer(_) => Err("inferred `_` types".to_string()),
        _ => Err("macro or verbatim types".to_string()),
    }
}

fn render_return(output: &ReturnType) -> std::result::Result<String, String> {
    match output {
        ReturnType::Default => Ok(String::new()),
        ReturnType::Type(_, ty) => Ok(format!(" -> {}", render_type(ty)?)),
    }
}

fn render_path(path: &syn::Path) -> std::result::Result<String, String> {
    let mut output = String::new();
    if path.leading_colon.is_some() {
        output.push_str("::");
    }
    for (i, segment) in path.segments.iter().enumerate() {
        if i > 0 {
            output.push_str("::");
        }
        output.push_str(&segment.ident.to_string());
        match &segment.arguments {
            PathArguments::None => {}
            PathArguments::AngleBracketed(args) => {
                let args = args
                    .args
                    .iter()
                    .map(render_generic_arg)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                output.push_str(&format!("<{}>", args.join(", ")));
            }
            PathArguments::Parenthesized(args) => {
                let inputs = args
                    .inputs
                    .iter()
                    .map(render_type)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                output.push_str(&format!("({}){}", inputs.join(", "), render_return(&args.output)?));
            }
        }
    }
    Ok(output)
}

fn render_generic_arg(arg: &GenericArgument) -> std::result::Result<String, String> {
    match arg {
        GenericArgument::Lifetime(l) => Ok(l.to_string()),
        GenericArgument::Type(ty) => render_type(ty),
        GenericArgument::Const(expr) => render_expr(expr),
        GenericArgument::AssocType(assoc) => Ok(format!("{} = {}", assoc.ident, render_type(&assoc.ty)?)),
        GenericArgument::AssocConst(assoc) => Ok(format!("{} = {}", assoc.ident, render_expr(&assoc.value)?)),
        GenericArgument::Constraint(c) => Ok(format!("{}: {}", c.ident, render_bounds(c.bounds.iter())?)),
        _ => Err("unknown generic argument".to_string()),
    }
}

fn render_bounds<'a>(
    bounds: impl Iterator<Item = &'a TypeParamBound>,
) -> std::result::Result<String, String> {
    let bounds = bounds
        .map(|bound| match bound {
            TypeParamBound::Trait(t) => {
                let maybe = if matches!(t.modifier, syn::TraitBoundModifier::Maybe(_)) {
                    "?"
                } else {
                    ""
                };
                Ok(format!("{maybe}{}", render_path(&t.path)?))
            }
            TypeParamBound::Lifetime(l) => Ok(l.to_string()),
            _ => Err("unknown trait bound".to_string()),
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;
    Ok(bounds.join(" + "))
}

/// Array lengths and const generic arguments: literals and paths only.
fn render_expr(expr: &Expr) -> std::result::Result<String, String> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            syn::Lit::Int(int) => Ok(int.to_string()),
            syn::Lit::Bool(b) => Ok(b.value.to_string()),
            _ => Err("non-integer constant".to_string()),
        },
        Expr::Path(p) if p.qself.is_none() => render_path(&p.path),
        _ => Err("computed constant expressions".to_string()),
    }
}

fn render_visibility(vis: &Visibility) -> String {
    match vis {
        Visibility::Public(_) => "pub".to_string(),
        Visibility::Restricted(restricted) => {
            let path = render_path(&restricted.path).unwrap_or_default();
            if restricted.in_token.is_some() {
                format!("pub(in {path})")
            } else {
                format!("pub({path})")
            }
        }
        Visibility::Inherited => String::new(),
    }
}

fn receiver(sig: &Signature) -> std::result::Result<Option<Receiver>, String> {
    let Some(recv) = sig.receiver() else {
        return Ok(None);
    };
    if recv.colon_token.is_some() {
        return Err("typed `self` receivers".to_string());
    }
    Ok(Some(match (&recv.reference, &recv.mutability) {
        (Some(_), Some(_)) => Receiver::RefMut,
        (Some(_), None) => Receiver::Ref,
        (None, _) => Receiver::Value,
    }))
}

/// Non-receiver parameters of a signature.
fn params(sig: &Signature, ctx: &SourceContext) -> std::result::Result<Vec<Param>, String> {
    sig.inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Receiver(_) => None,
            FnArg::Typed(pat_type) => Some(pat_type),
        })
        .map(|pat_type| {
            let Pat::Ident(ident) = &*pat_type.pat else {
                return Err("parameter patterns other than plain identifiers".to_string());
            };
            Ok(Param::new(ident.ident.to_string(), type_ref(&pat_type.ty, ctx)?))
        })
        .collect()
}

fn return_type(sig: &Signature, ctx: &SourceContext) -> std::result::Result<Option<TypeRef>, String> {
    match &sig.output {
        ReturnType::Default => Ok(None),
        ReturnType::Type(_, ty) => type_ref(ty, ctx).map(Some),
    }
}

fn extract_struct(codegen: &mut CodeGenerator, item: &ItemStruct, ctx: &SourceContext) {
    let name = item.ident.to_string();
    let constructor = match &item.fields {
        syn::Fields::Named(named) => Some(
            named
                .named
                .iter()
                .filter_map(|field| {
                    let ident = field.ident.as_ref()?.to_string();
                    let ty = type_ref(&field.ty, ctx).unwrap_or_else(|detail| {
                        tracing::debug!(ty = %name, field = %ident, %detail, "field type not representable");
                        TypeRef::named("_")
                    });
                    Some(Param::new(ident, ty))
                })
                .collect::<Vec<_>>(),
        ),
        syn::Fields::Unit => Some(Vec::new()),
        syn::Fields::Unnamed(_) => None,
    };

    let descriptor = codegen.registry.entry(&name, &ctx.module);
    descriptor.module = ctx.module.clone();
    descriptor.properties = constructor
        .iter()
        .flatten()
        .map(|field| (field.name.clone(), field.ty.clone()))
        .collect();
    descriptor.constructor = constructor;
}

/// Add the `self` methods of an inherent impl block to the type's descriptor.
fn extract_impl(codegen: &mut CodeGenerator, item: &ItemImpl, ctx: &SourceContext) {
    if item.trait_.is_some() {
        return;
    }
    let Type::Path(TypePath { qself: None, path }) = &*item.self_ty else {
        return;
    };

    let mut methods = Vec::new();
    for impl_item in &item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let Ok(Some(_)) = receiver(&method.sig) else {
            continue;
        };
        let (Ok(params), Ok(returns)) = (params(&method.sig, ctx), return_type(&method.sig, ctx))
        else {
            continue;
        };
        methods.push((method.sig.ident.to_string(), MethodSig { params, returns }));
    }

    let name = lookup_name(path, ctx);
    codegen.registry.entry(&name, &ctx.module).methods.extend(methods);
}

fn extract_unit(codegen: &mut CodeGenerator, item: &ItemTrait, ctx: &SourceContext) {
    let Some(attr) = marker_attr(&item.attrs, ctx) else {
        return;
    };

    match build_unit(item, attr, ctx) {
        Ok(unit) => {
            tracing::debug!(
                unit = %unit.name,
                module = %unit.module,
                functions = unit.functions.len(),
                "found mapping unit"
            );
            codegen.add_unit(unit);
        }
        Err(reason) => codegen.reject(MalformedUnit::new(item.ident.to_string(), reason)),
    }
}

fn build_unit(
    item: &ItemTrait,
    attr: &Attribute,
    ctx: &SourceContext,
) -> std::result::Result<MappingUnit, MalformedReason> {
    let name = item.ident.to_string();
    let args = parse_marker_args(attr).map_err(|e| MalformedReason::InvalidArguments(e.to_string()))?;
    if !item.generics.params.is_empty() {
        return Err(MalformedReason::UnsupportedSignature {
            function: name,
            detail: "generic mapping traits".to_string(),
        });
    }

    let mut unit = MappingUnit::new(&name, ctx.module.clone())
        .with_visibility(render_visibility(&item.vis))
        .with_wrappers(args.generate_wrapper);
    if let Some(base) = &args.base {
        let source = render_path(base).map_err(|detail| MalformedReason::UnsupportedSignature {
            function: name.clone(),
            detail,
        })?;
        unit = unit.with_base(TypeRef::with_source(lookup_name(base, ctx), source));
    }
    if let Some(impl_name) = args.impl_name {
        unit = unit.with_impl_name(impl_name);
    }

    for trait_item in &item.items {
        if let TraitItem::Fn(function) = trait_item {
            unit.functions.push(extract_function(function, ctx)?);
        }
    }
    Ok(unit)
}

fn extract_function(
    item: &TraitItemFn,
    ctx: &SourceContext,
) -> std::result::Result<MappingFunction, MalformedReason> {
    let name = item.sig.ident.to_string();
    let unsupported = |detail: String| MalformedReason::UnsupportedSignature {
        function: name.clone(),
        detail,
    };

    // Provided functions are only called, never emitted, so their types are
    // not needed beyond the parameter count.
    if item.default.is_some() {
        let arity = item
            .sig
            .inputs
            .iter()
            .filter(|arg| matches!(arg, FnArg::Typed(_)))
            .count();
        let params = params(&item.sig, ctx).unwrap_or_else(|_| {
            (0..arity)
                .map(|i| Param::new(format!("_{i}"), TypeRef::named("_")))
                .collect()
        });
        return Ok(MappingFunction {
            receiver: receiver(&item.sig).ok().flatten(),
            params,
            return_type: return_type(&item.sig, ctx).ok().flatten(),
            kind: FunctionKind::Provided,
            name,
        });
    }

    if !item.sig.generics.params.is_empty() {
        return Err(unsupported("generic parameters".to_string()));
    }
    Ok(MappingFunction {
        receiver: receiver(&item.sig).map_err(unsupported)?,
        params: params(&item.sig, ctx).map_err(unsupported)?,
        return_type: return_type(&item.sig, ctx).map_err(unsupported)?,
        kind: FunctionKind::Abstract,
        name,
    })
}

fn extract_items(codegen: &mut CodeGenerator, items: &[Item], ctx: &SourceContext) {
    for item in items {
        match item {
            Item::Struct(s) => extract_struct(codegen, s, ctx),
            Item::Enum(e) => {
                codegen.registry.entry(&e.ident.to_string(), &ctx.module).module = ctx.module.clone();
            }
            Item::Impl(i) => extract_impl(codegen, i, ctx),
            Item::Trait(t) => extract_unit(codegen, t, ctx),
            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    extract_items(codegen, items, &ctx.nested(items));
                }
            }
            _ => {}
        }
    }
}

fn parse_source(codegen: &mut CodeGenerator, source: &str, module: ModuleId) -> Result<()> {
    let file = syn::parse_file(source).map_err(|source| Error::Parse {
        module: module.clone(),
        source,
    })?;
    let ctx = SourceContext::new(module, &file.items);
    extract_items(codegen, &file.items, &ctx);
    Ok(())
}

impl CodeGenerator {
    /// Parse a single Rust source file and extract mapping units and types.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), mapper_codegen::Error> {
    /// use mapper_codegen::CodeGenerator;
    ///
    /// let mut generator = CodeGenerator::new();
    /// generator.add_source_file("src/lib.rs")?;
    /// generator.generate_units()?.write_to_dir("generated")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_source_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        parse_source(self, &source, ModuleId::new(path.display().to_string()))?;
        Ok(self)
    }

    /// Parse Rust source from a string. Declarations get the `<inline>` module id.
    pub fn add_source_str(&mut self, source: &str) -> Result<&mut Self> {
        parse_source(self, source, ModuleId::inline())?;
        Ok(self)
    }

    /// Recursively scan a directory for `.rs` files, in file name order.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), mapper_codegen::Error> {
    /// use mapper_codegen::CodeGenerator;
    ///
    /// let mut generator = CodeGenerator::new();
    /// generator.add_source_dir("src/")?;
    /// generator.write_to_file("generated/mappers.rs")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_source_dir(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let root = path.as_ref();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::io(path, e.into())
            })?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "rs") {
                self.add_source_file(path)?;
            }
        }
        Ok(self)
    }
}

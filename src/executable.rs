//! Executable schemas: SDL type definitions paired with field resolvers
//!
//! An [`ExecutableSchema`] is what the federation transform consumes and
//! produces. It keeps the parsed type definitions (so they can be inspected,
//! rewritten and printed) next to a [`ResolverMap`], and lowers both onto an
//! `async_graphql::dynamic::Schema` for execution.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use apollo_compiler::ast::{
    self, Definition, DirectiveList, Document, FieldDefinition, InputValueDefinition,
    OperationType, SchemaDefinition, Type,
};
use apollo_compiler::Node;
use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, Scalar, Schema, SchemaBuilder, TypeRef, Union,
};
use async_graphql::{Context, Name, Number, Value};
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::{FederationError, Result};

const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

/// Resolves the value of one field
///
/// Implemented for closures wrapped with [`resolver_fn`].
#[async_trait]
pub trait FieldResolver: Send + Sync {
    async fn resolve(&self, info: &ResolveInfo<'_>) -> async_graphql::Result<Value>;
}

#[async_trait]
impl<F> FieldResolver for F
where
    F: for<'a> Fn(&'a ResolveInfo<'a>) -> BoxFuture<'a, async_graphql::Result<Value>>
        + Send
        + Sync,
{
    async fn resolve(&self, info: &ResolveInfo<'_>) -> async_graphql::Result<Value> {
        (self)(info).await
    }
}

/// Pin a closure to the signature [`FieldResolver`] expects
///
/// # Example
///
/// ```rust,no_run
/// use async_graphql::Value;
/// use futures::FutureExt;
/// use graphql_transform_federation::{resolver_fn, ExecutableSchema};
///
/// # fn example() -> graphql_transform_federation::Result<()> {
/// let schema = ExecutableSchema::new("type Query { version: String }")?
///     .resolver("Query", "version", resolver_fn(|_info| {
///         async move { Ok(Value::String("1.0".into())) }.boxed()
///     }));
/// # let _ = schema;
/// # Ok(())
/// # }
/// ```
pub fn resolver_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a ResolveInfo<'a>) -> BoxFuture<'a, async_graphql::Result<Value>>
        + Send
        + Sync
        + 'static,
{
    f
}

/// Everything a resolver can see about the field being resolved
pub struct ResolveInfo<'a> {
    /// Execution context of the running request (request data, error sink)
    pub ctx: &'a Context<'a>,
    pub parent_type: &'a str,
    pub field_name: &'a str,
    /// Value returned for the parent object, `Null` on root types
    pub parent: &'a Value,
    pub args: &'a IndexMap<Name, Value>,
    resolvers: &'a ResolverMap,
}

impl<'a> ResolveInfo<'a> {
    /// Get an argument value by name
    pub fn arg(&self, name: &str) -> Option<&'a Value> {
        self.args.get(&Name::new(name))
    }

    /// Get request data, failing if it was not provided
    pub fn data<D: Any + Send + Sync>(&self) -> async_graphql::Result<&'a D> {
        self.ctx.data::<D>()
    }

    pub fn data_opt<D: Any + Send + Sync>(&self) -> Option<&'a D> {
        self.ctx.data_opt::<D>()
    }

    /// Resolve another field of the same schema from inside this resolver
    ///
    /// The target field runs with a `Null` parent and the given arguments,
    /// sharing this request's context. Fields without a registered resolver
    /// resolve to `Null`.
    pub async fn delegate(
        &self,
        type_name: &str,
        field_name: &str,
        args: IndexMap<Name, Value>,
    ) -> async_graphql::Result<Value> {
        tracing::trace!(type_name, field_name, "delegating field resolution");

        let parent = Value::Null;
        let info = ResolveInfo {
            ctx: self.ctx,
            parent_type: type_name,
            field_name,
            parent: &parent,
            args: &args,
            resolvers: self.resolvers,
        };
        self.resolvers.resolve(&info).await
    }
}

/// Field resolvers keyed by type name, then field name
#[derive(Clone, Default)]
pub struct ResolverMap {
    types: HashMap<String, HashMap<String, Arc<dyn FieldResolver>>>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver, replacing any previous one for the same field
    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Arc<dyn FieldResolver>,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), resolver);
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&Arc<dyn FieldResolver>> {
        self.types.get(type_name)?.get(field_name)
    }

    pub fn contains(&self, type_name: &str, field_name: &str) -> bool {
        self.get(type_name, field_name).is_some()
    }

    /// Run the registered resolver, or the default one when there is none
    pub(crate) async fn resolve(&self, info: &ResolveInfo<'_>) -> async_graphql::Result<Value> {
        match self.get(info.parent_type, info.field_name) {
            Some(resolver) => resolver.resolve(info).await,
            None => Ok(default_resolve(info.parent, info.field_name)),
        }
    }
}

impl fmt::Debug for ResolverMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<String> = self
            .types
            .iter()
            .flat_map(|(ty, fields)| fields.keys().map(move |field| format!("{ty}.{field}")))
            .collect();
        fields.sort();
        f.debug_struct("ResolverMap").field("fields", &fields).finish()
    }
}

/// Read the parent object's entry named after the field
pub(crate) fn default_resolve(parent: &Value, field_name: &str) -> Value {
    match parent {
        Value::Object(fields) => fields
            .get(&Name::new(field_name))
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Type definitions plus resolvers, ready to be lowered to a dynamic schema
#[derive(Clone)]
pub struct ExecutableSchema {
    document: Document,
    resolvers: ResolverMap,
}

impl ExecutableSchema {
    /// Parse SDL type definitions
    ///
    /// `extend` blocks are folded into the definition they extend, wherever
    /// they appear in the source.
    pub fn new(type_defs: &str) -> Result<Self> {
        let document = Document::parse(type_defs, "schema.graphql")
            .map_err(|e| FederationError::Parse(e.errors.to_string()))?;

        Ok(Self {
            document: merge_extensions(document)?,
            resolvers: ResolverMap::new(),
        })
    }

    pub fn from_parts(document: Document, resolvers: ResolverMap) -> Self {
        Self {
            document,
            resolvers,
        }
    }

    pub fn into_parts(self) -> (Document, ResolverMap) {
        (self.document, self.resolvers)
    }

    /// Attach a resolver to `type_name.field_name`
    pub fn resolver(
        mut self,
        type_name: &str,
        field_name: &str,
        resolver: impl FieldResolver + 'static,
    ) -> Self {
        self.resolvers
            .insert(type_name, field_name, Arc::new(resolver));
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    pub fn type_definitions(&self) -> impl Iterator<Item = &Definition> {
        type_definitions(&self.document)
    }

    pub fn type_definition(&self, name: &str) -> Option<&Definition> {
        self.type_definitions()
            .find(|definition| type_name(definition).is_some_and(|n| n.as_str() == name))
    }

    pub fn query_type_name(&self) -> String {
        query_type_name(&self.document).to_string()
    }

    /// The mutation root, when the schema declares one
    pub fn mutation_type_name(&self) -> Option<String> {
        match schema_definition(&self.document) {
            Some(schema) => {
                root_operation(schema, OperationType::Mutation).map(|name| name.to_string())
            }
            None => self
                .type_definition("Mutation")
                .map(|_| "Mutation".to_string()),
        }
    }

    /// Print the type definitions as SDL
    pub fn sdl(&self) -> String {
        crate::sdl::print_document(&self.document)
    }

    /// Lower to a dynamic schema builder, so callers can attach request data
    pub fn schema_builder(&self) -> Result<SchemaBuilder> {
        let query = self.query_type_name();
        if self.type_definition(&query).is_none() {
            return Err(FederationError::Schema(format!(
                "query root type \"{query}\" is not defined"
            )));
        }
        if schema_definition(&self.document)
            .is_some_and(|schema| root_operation(schema, OperationType::Subscription).is_some())
        {
            return Err(FederationError::Schema(
                "subscription root types are not supported".to_string(),
            ));
        }

        let mutation = self.mutation_type_name();
        let kinds = Arc::new(OutputKinds::from_document(&self.document));
        let resolvers = Arc::new(self.resolvers.clone());

        let mut builder = Schema::build(&query, mutation.as_deref(), None);
        for definition in self.type_definitions() {
            builder = match definition {
                Definition::ScalarTypeDefinition(scalar)
                    if BUILTIN_SCALARS.contains(&scalar.name.as_str()) =>
                {
                    builder
                }
                Definition::ScalarTypeDefinition(scalar) => {
                    let mut target = Scalar::new(scalar.name.as_str());
                    if let Some(description) = &scalar.description {
                        target = target.description(description.to_string());
                    }
                    builder.register(target)
                }
                Definition::ObjectTypeDefinition(object) => {
                    let mut target = Object::new(object.name.as_str());
                    if let Some(description) = &object.description {
                        target = target.description(description.to_string());
                    }
                    for interface in &object.implements_interfaces {
                        target = target.implement(interface.as_str());
                    }
                    for field in &object.fields {
                        target = target.field(build_field(
                            object.name.as_str(),
                            field,
                            &resolvers,
                            &kinds,
                        ));
                    }
                    builder.register(target)
                }
                Definition::InterfaceTypeDefinition(interface) => {
                    let mut target = Interface::new(interface.name.as_str());
                    if let Some(description) = &interface.description {
                        target = target.description(description.to_string());
                    }
                    for parent in &interface.implements_interfaces {
                        target = target.implement(parent.as_str());
                    }
                    for field in &interface.fields {
                        target = target.field(build_interface_field(field));
                    }
                    builder.register(target)
                }
                Definition::UnionTypeDefinition(union) => {
                    let mut target = Union::new(union.name.as_str());
                    if let Some(description) = &union.description {
                        target = target.description(description.to_string());
                    }
                    for member in &union.members {
                        target = target.possible_type(member.as_str());
                    }
                    builder.register(target)
                }
                Definition::EnumTypeDefinition(enum_type) => {
                    let mut target = Enum::new(enum_type.name.as_str());
                    if let Some(description) = &enum_type.description {
                        target = target.description(description.to_string());
                    }
                    for value in &enum_type.values {
                        let mut item = EnumItem::new(value.value.as_str());
                        if let Some(description) = &value.description {
                            item = item.description(description.to_string());
                        }
                        if let Some(reason) = deprecation(&value.directives) {
                            item = item.deprecation(reason.as_deref());
                        }
                        target = target.item(item);
                    }
                    builder.register(target)
                }
                Definition::InputObjectTypeDefinition(input) => {
                    let mut target = InputObject::new(input.name.as_str());
                    if let Some(description) = &input.description {
                        target = target.description(description.to_string());
                    }
                    for field in &input.fields {
                        target = target.field(build_input_value(field));
                    }
                    builder.register(target)
                }
                _ => builder,
            };
        }

        Ok(builder)
    }

    /// Lower to an executable dynamic schema
    pub fn finish(&self) -> Result<Schema> {
        self.schema_builder()?
            .finish()
            .map_err(|e| FederationError::Schema(e.to_string()))
    }
}

impl fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self
            .type_definitions()
            .filter_map(type_name)
            .map(|name| name.as_str())
            .collect();
        f.debug_struct("ExecutableSchema")
            .field("types", &types)
            .field("resolvers", &self.resolvers)
            .finish()
    }
}

/// Name of a named type definition; `None` for every other definition
pub(crate) fn type_name(definition: &Definition) -> Option<&apollo_compiler::Name> {
    match definition {
        Definition::ScalarTypeDefinition(ty) => Some(&ty.name),
        Definition::ObjectTypeDefinition(ty) => Some(&ty.name),
        Definition::InterfaceTypeDefinition(ty) => Some(&ty.name),
        Definition::UnionTypeDefinition(ty) => Some(&ty.name),
        Definition::EnumTypeDefinition(ty) => Some(&ty.name),
        Definition::InputObjectTypeDefinition(ty) => Some(&ty.name),
        _ => None,
    }
}

fn extension_name(definition: &Definition) -> Option<&apollo_compiler::Name> {
    match definition {
        Definition::ScalarTypeExtension(ty) => Some(&ty.name),
        Definition::ObjectTypeExtension(ty) => Some(&ty.name),
        Definition::InterfaceTypeExtension(ty) => Some(&ty.name),
        Definition::UnionTypeExtension(ty) => Some(&ty.name),
        Definition::EnumTypeExtension(ty) => Some(&ty.name),
        Definition::InputObjectTypeExtension(ty) => Some(&ty.name),
        _ => None,
    }
}

pub(crate) fn type_definitions(document: &Document) -> impl Iterator<Item = &Definition> {
    document
        .definitions
        .iter()
        .filter(|definition| type_name(definition).is_some())
}

pub(crate) fn schema_definition(document: &Document) -> Option<&Node<SchemaDefinition>> {
    document
        .definitions
        .iter()
        .find_map(|definition| match definition {
            Definition::SchemaDefinition(schema) => Some(schema),
            _ => None,
        })
}

fn root_operation(schema: &SchemaDefinition, operation: OperationType) -> Option<&apollo_compiler::Name> {
    schema
        .root_operations
        .iter()
        .find(|root| root.0 == operation)
        .map(|root| &root.1)
}

pub(crate) fn query_type_name(document: &Document) -> apollo_compiler::Name {
    schema_definition(document)
        .and_then(|schema| root_operation(schema, OperationType::Query))
        .cloned()
        .unwrap_or_else(|| apollo_compiler::name!("Query"))
}

/// Fold every `extend` block into its base definition
///
/// Base definitions are collected first, so an extension may precede the
/// type it extends.
fn merge_extensions(mut document: Document) -> Result<Document> {
    let mut extensions = Vec::new();
    for definition in std::mem::take(&mut document.definitions) {
        match definition {
            Definition::OperationDefinition(_) | Definition::FragmentDefinition(_) => {
                return Err(FederationError::Parse(
                    "operations and fragments are not allowed in type definitions".to_string(),
                ));
            }
            Definition::SchemaExtension(_) => extensions.push(definition),
            definition if extension_name(&definition).is_some() => extensions.push(definition),
            definition => document.definitions.push(definition),
        }
    }

    for extension in extensions {
        merge_into(&mut document.definitions, extension)?;
    }

    Ok(document)
}

fn merge_into(definitions: &mut [Definition], extension: Definition) -> Result<()> {
    if let Definition::SchemaExtension(extension) = &extension {
        let schema = definitions
            .iter_mut()
            .find_map(|definition| match definition {
                Definition::SchemaDefinition(schema) => Some(schema),
                _ => None,
            })
            .ok_or_else(|| {
                FederationError::Schema(
                    "cannot extend the schema because it has no schema definition".to_string(),
                )
            })?;
        let schema = schema.make_mut();
        schema.directives.extend(extension.directives.iter().cloned());
        schema
            .root_operations
            .extend(extension.root_operations.iter().cloned());
        return Ok(());
    }

    let Some(name) = extension_name(&extension).cloned() else {
        return Ok(());
    };
    let base = definitions
        .iter_mut()
        .find(|definition| type_name(definition) == Some(&name))
        .ok_or_else(|| {
            FederationError::Schema(format!(
                "cannot extend type \"{name}\" because it is not defined"
            ))
        })?;

    match (base, extension) {
        (Definition::ScalarTypeDefinition(base), Definition::ScalarTypeExtension(ext)) => {
            base.make_mut()
                .directives
                .extend(ext.directives.iter().cloned());
        }
        (Definition::ObjectTypeDefinition(base), Definition::ObjectTypeExtension(ext)) => {
            let base = base.make_mut();
            base.implements_interfaces
                .extend(ext.implements_interfaces.iter().cloned());
            base.directives.extend(ext.directives.iter().cloned());
            base.fields.extend(ext.fields.iter().cloned());
        }
        (Definition::InterfaceTypeDefinition(base), Definition::InterfaceTypeExtension(ext)) => {
            let base = base.make_mut();
            base.implements_interfaces
                .extend(ext.implements_interfaces.iter().cloned());
            base.directives.extend(ext.directives.iter().cloned());
            base.fields.extend(ext.fields.iter().cloned());
        }
        (Definition::UnionTypeDefinition(base), Definition::UnionTypeExtension(ext)) => {
            let base = base.make_mut();
            base.directives.extend(ext.directives.iter().cloned());
            base.members.extend(ext.members.iter().cloned());
        }
        (Definition::EnumTypeDefinition(base), Definition::EnumTypeExtension(ext)) => {
            let base = base.make_mut();
            base.directives.extend(ext.directives.iter().cloned());
            base.values.extend(ext.values.iter().cloned());
        }
        (
            Definition::InputObjectTypeDefinition(base),
            Definition::InputObjectTypeExtension(ext),
        ) => {
            let base = base.make_mut();
            base.directives.extend(ext.directives.iter().cloned());
            base.fields.extend(ext.fields.iter().cloned());
        }
        _ => {
            return Err(FederationError::Schema(format!(
                "type \"{name}\" is extended with a different kind of definition"
            )))
        }
    }

    Ok(())
}

fn build_field(
    type_name: &str,
    field: &FieldDefinition,
    resolvers: &Arc<ResolverMap>,
    kinds: &Arc<OutputKinds>,
) -> Field {
    let type_name: Arc<str> = type_name.into();
    let field_name: Arc<str> = field.name.as_str().into();
    let output = Arc::new(field.ty.clone());
    let resolvers = resolvers.clone();
    let kinds = kinds.clone();

    let mut target = Field::new(field.name.as_str(), type_ref(&field.ty), move |ctx| {
        let type_name = type_name.clone();
        let field_name = field_name.clone();
        let output = output.clone();
        let resolvers = resolvers.clone();
        let kinds = kinds.clone();

        FieldFuture::new(async move {
            let args: IndexMap<Name, Value> = ctx
                .args
                .iter()
                .map(|(name, value)| (name.clone(), value.as_value().clone()))
                .collect();
            let parent = ctx
                .parent_value
                .as_value()
                .cloned()
                .unwrap_or(Value::Null);

            let info = ResolveInfo {
                ctx: ctx.ctx,
                parent_type: &*type_name,
                field_name: &*field_name,
                parent: &parent,
                args: &args,
                resolvers: &resolvers,
            };
            let value = resolvers.resolve(&info).await?;

            Ok(kinds.to_field_value(value, &output))
        })
    });

    if let Some(description) = &field.description {
        target = target.description(description.to_string());
    }
    if let Some(reason) = deprecation(&field.directives) {
        target = target.deprecation(reason.as_deref());
    }
    for argument in &field.arguments {
        target = target.argument(build_input_value(argument));
    }
    target
}

fn build_interface_field(field: &FieldDefinition) -> InterfaceField {
    let mut target = InterfaceField::new(field.name.as_str(), type_ref(&field.ty));
    if let Some(description) = &field.description {
        target = target.description(description.to_string());
    }
    if let Some(reason) = deprecation(&field.directives) {
        target = target.deprecation(reason.as_deref());
    }
    for argument in &field.arguments {
        target = target.argument(build_input_value(argument));
    }
    target
}

fn build_input_value(definition: &InputValueDefinition) -> InputValue {
    let mut input = InputValue::new(definition.name.as_str(), type_ref(&definition.ty));
    if let Some(description) = &definition.description {
        input = input.description(description.to_string());
    }
    if let Some(default) = &definition.default_value {
        input = input.default_value(const_value(default));
    }
    input
}

/// `Some(reason)` when the directives mark the element as deprecated
fn deprecation(directives: &DirectiveList) -> Option<Option<String>> {
    let directive = directives
        .iter()
        .find(|directive| directive.name.as_str() == "deprecated")?;

    let reason = directive
        .arguments
        .iter()
        .find(|argument| argument.name.as_str() == "reason")
        .and_then(|argument| match &*argument.value {
            ast::Value::String(reason) => Some(reason.clone()),
            _ => None,
        });
    Some(reason)
}

/// Convert a literal from the type definitions into a runtime value
fn const_value(value: &ast::Value) -> Value {
    match value {
        ast::Value::Null | ast::Value::Variable(_) => Value::Null,
        ast::Value::Enum(name) => Value::Enum(Name::new(name.as_str())),
        ast::Value::String(value) => Value::String(value.clone()),
        ast::Value::Boolean(value) => Value::Boolean(*value),
        ast::Value::Int(value) => value
            .as_str()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ast::Value::Float(value) => value
            .as_str()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ast::Value::List(items) => Value::List(items.iter().map(|item| const_value(item)).collect()),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (Name::new(name.as_str()), const_value(value)))
                .collect(),
        ),
    }
}

pub(crate) fn type_ref(ty: &Type) -> TypeRef {
    match ty {
        Type::Named(name) => TypeRef::named(name.as_str()),
        Type::NonNullNamed(name) => TypeRef::named_nn(name.as_str()),
        Type::List(item) => TypeRef::List(Box::new(type_ref(item))),
        Type::NonNullList(item) => {
            TypeRef::NonNull(Box::new(TypeRef::List(Box::new(type_ref(item)))))
        }
    }
}

/// Output-side type facts needed to hand values to the executor
struct OutputKinds {
    abstract_types: HashSet<String>,
    enum_types: HashSet<String>,
}

impl OutputKinds {
    fn from_document(document: &Document) -> Self {
        let mut abstract_types = HashSet::new();
        let mut enum_types = HashSet::new();

        for definition in type_definitions(document) {
            match definition {
                Definition::UnionTypeDefinition(union) => {
                    abstract_types.insert(union.name.to_string());
                }
                Definition::InterfaceTypeDefinition(interface) => {
                    abstract_types.insert(interface.name.to_string());
                }
                Definition::EnumTypeDefinition(enum_type) => {
                    enum_types.insert(enum_type.name.to_string());
                }
                _ => {}
            }
        }

        Self {
            abstract_types,
            enum_types,
        }
    }

    /// Convert a resolved value following the field's declared type
    ///
    /// Objects returned for unions and interfaces are tagged with the type
    /// named by their `__typename` entry.
    fn to_field_value<'v>(&self, value: Value, ty: &Type) -> Option<FieldValue<'v>> {
        match (value, ty) {
            (Value::Null, _) => None,
            (Value::List(items), Type::List(item) | Type::NonNullList(item)) => {
                Some(FieldValue::list(items.into_iter().map(|value| {
                    self.to_field_value(value, item)
                        .unwrap_or(FieldValue::NULL)
                })))
            }
            (Value::Object(object), Type::Named(name) | Type::NonNullNamed(name))
                if self.abstract_types.contains(name.as_str()) =>
            {
                let typename = match object.get(&Name::new(crate::types::TYPENAME)) {
                    Some(Value::String(typename)) => Some(typename.clone()),
                    _ => None,
                };
                let value = FieldValue::value(Value::Object(object));
                Some(match typename {
                    Some(typename) => value.with_type(typename),
                    None => value,
                })
            }
            (Value::String(variant), Type::Named(name) | Type::NonNullNamed(name))
                if self.enum_types.contains(name.as_str()) =>
            {
                Some(FieldValue::value(Value::Enum(Name::new(variant))))
            }
            (value, _) => Some(FieldValue::value(value)),
        }
    }
}

//! SDL printing and federation directive injection
//!
//! [`print_document`] renders type definitions with the `apollo-compiler`
//! serializer. [`federation_sdl`] produces the `_service { sdl }` text: the
//! same rendering, with `@key`, `@extends` and the field-level federation
//! directives attached to the configured declarations. Annotation works on a
//! copy-on-write clone, so the source document is never mutated.

use apollo_compiler::ast::{Argument, Definition, Directive, DirectiveList, Document, Value};
use apollo_compiler::{name, Name, Node};

use crate::classify::{ClassifiedType, TypeClassification};
use crate::config::FederationFieldConfig;

/// Print every definition, separated by blank lines, ending with a newline
pub fn print_document(document: &Document) -> String {
    let mut sdl = document.to_string();
    if !sdl.is_empty() && !sdl.ends_with('\n') {
        sdl.push('\n');
    }
    sdl
}

/// Print the schema with federation directives attached
pub fn federation_sdl(document: &Document, classification: &TypeClassification) -> String {
    let mut annotated = document.clone();
    for definition in &mut annotated.definitions {
        annotate(definition, classification);
    }
    print_document(&annotated)
}

/// Attach the federation directives of a configured type
///
/// Nodes are shared with the source document until `make_mut` copies them.
fn annotate(definition: &mut Definition, classification: &TypeClassification) {
    let Some(classified) = type_name(definition).and_then(|name| classification.configured(name))
    else {
        return;
    };

    let type_directives = type_directives(classified);
    if !type_directives.is_empty() {
        if let Some(directives) = directives_mut(definition) {
            directives.extend(type_directives);
        }
    }

    let field_configs = &classified.config.fields;
    if field_configs.values().all(FederationFieldConfig::is_empty) {
        return;
    }
    let fields = match definition {
        Definition::ObjectTypeDefinition(object) => &mut object.make_mut().fields,
        Definition::InterfaceTypeDefinition(interface) => &mut interface.make_mut().fields,
        _ => return,
    };
    for field in fields {
        if let Some(config) = field_configs.get(field.name.as_str()) {
            if !config.is_empty() {
                field.make_mut().directives.extend(field_directives(config));
            }
        }
    }
}

fn type_name(definition: &Definition) -> Option<&str> {
    crate::executable::type_name(definition).map(|name| name.as_str())
}

fn directives_mut(definition: &mut Definition) -> Option<&mut DirectiveList> {
    match definition {
        Definition::ScalarTypeDefinition(ty) => Some(&mut ty.make_mut().directives),
        Definition::ObjectTypeDefinition(ty) => Some(&mut ty.make_mut().directives),
        Definition::InterfaceTypeDefinition(ty) => Some(&mut ty.make_mut().directives),
        Definition::UnionTypeDefinition(ty) => Some(&mut ty.make_mut().directives),
        Definition::EnumTypeDefinition(ty) => Some(&mut ty.make_mut().directives),
        Definition::InputObjectTypeDefinition(ty) => Some(&mut ty.make_mut().directives),
        _ => None,
    }
}

/// `@key` per key set in configuration order, then `@extends`
fn type_directives(classified: &ClassifiedType) -> Vec<Node<Directive>> {
    let mut directives = Vec::new();
    if classified.is_entity() {
        for key in &classified.config.keys {
            directives.push(fields_directive(name!("key"), key.join(" ")));
        }
    }
    if classified.config.extend {
        directives.push(directive(name!("extends"), Vec::new()));
    }
    directives
}

fn field_directives(config: &FederationFieldConfig) -> Vec<Node<Directive>> {
    let mut directives = Vec::new();
    if config.external {
        directives.push(directive(name!("external"), Vec::new()));
    }
    if let Some(fields) = &config.requires {
        directives.push(fields_directive(name!("requires"), fields.clone()));
    }
    if let Some(fields) = &config.provides {
        directives.push(fields_directive(name!("provides"), fields.clone()));
    }
    directives
}

fn fields_directive(name: Name, fields: String) -> Node<Directive> {
    directive(
        name,
        vec![Node::new(Argument {
            name: name!("fields"),
            value: Node::new(Value::String(fields)),
        })],
    )
}

fn directive(name: Name, arguments: Vec<Node<Argument>>) -> Node<Directive> {
    Node::new(Directive { name, arguments })
}

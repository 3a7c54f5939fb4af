//! `#[orm(...)]` attribute parsing shared by every derive.
//!
//! Items are either flags (`key`) or string values (`column = "Name"`).
//! Several `#[orm]` attributes on one item are merged; unknown items and
//! repeated items are errors.

use heck::{ToLowerCamelCase, ToPascalCase, ToShoutySnakeCase, ToSnakeCase};
use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::punctuated::Punctuated;
use syn::{Attribute, Error, Ident, LitStr, Result, Token};

use crate::sql_ident::{parse_sql_ident, parse_sql_ident_with_span};

/// One `name` or `name = "value"` item.
pub(crate) struct OrmItem {
    pub name: Ident,
    pub value: Option<LitStr>,
}

impl syn::parse::Parse for OrmItem {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        // `parse_any` so keyword-like names such as `default` parse too.
        let name = Ident::parse_any(input)?;
        let value = if input.peek(Token![=]) {
            let _: Token![=] = input.parse()?;
            Some(input.parse()?)
        } else {
            None
        };
        Ok(Self { name, value })
    }
}

impl OrmItem {
    fn flag(&self) -> Result<bool> {
        match &self.value {
            None => Ok(true),
            Some(lit) => Err(Error::new(
                lit.span(),
                format!("`{}` does not take a value", self.name),
            )),
        }
    }

    fn string(&self) -> Result<&LitStr> {
        self.value.as_ref().ok_or_else(|| {
            Error::new(
                self.name.span(),
                format!("`{}` requires a value: {} = \"...\"", self.name, self.name),
            )
        })
    }
}

fn orm_items(attrs: &[Attribute]) -> Result<Vec<OrmItem>> {
    let mut items = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args_with(Punctuated::<OrmItem, Token![,]>::parse_terminated)?;
        items.extend(nested);
    }
    Ok(items)
}

fn set_once<T>(slot: &mut Option<T>, value: T, item: &OrmItem) -> Result<()> {
    if slot.is_some() {
        return Err(Error::new(
            item.name.span(),
            format!("duplicate `{}` attribute", item.name),
        ));
    }
    *slot = Some(value);
    Ok(())
}

fn set_flag(slot: &mut bool, item: &OrmItem) -> Result<()> {
    if *slot {
        return Err(Error::new(
            item.name.span(),
            format!("duplicate `{}` attribute", item.name),
        ));
    }
    *slot = item.flag()?;
    Ok(())
}

fn unknown(item: &OrmItem, allowed: &str) -> Error {
    Error::new(
        item.name.span(),
        format!("unknown attribute `{}` (expected one of: {allowed})", item.name),
    )
}

/// Case conversion applied to field or variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenameRule {
    PascalCase,
    CamelCase,
    SnakeCase,
    ScreamingSnakeCase,
    Lowercase,
    Uppercase,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> Result<Self> {
        Ok(match lit.value().as_str() {
            "PascalCase" => Self::PascalCase,
            "camelCase" => Self::CamelCase,
            "snake_case" => Self::SnakeCase,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnakeCase,
            "lowercase" => Self::Lowercase,
            "UPPERCASE" => Self::Uppercase,
            other => {
                return Err(Error::new(
                    lit.span(),
                    format!(
                        "unknown rename rule '{other}' (expected PascalCase, camelCase, \
                         snake_case, SCREAMING_SNAKE_CASE, lowercase or UPPERCASE)"
                    ),
                ));
            }
        })
    }

    pub fn apply(self, name: &str) -> String {
        match self {
            Self::PascalCase => name.to_pascal_case(),
            Self::CamelCase => name.to_lower_camel_case(),
            Self::SnakeCase => name.to_snake_case(),
            Self::ScreamingSnakeCase => name.to_shouty_snake_case(),
            Self::Lowercase => name.to_lowercase(),
            Self::Uppercase => name.to_uppercase(),
        }
    }
}

/// Struct- or enum-level attributes.
#[derive(Default)]
pub(crate) struct ContainerAttrs {
    pub entity: Option<String>,
    pub schema: Option<String>,
    /// Variant name of `vorm::Dialect`.
    pub dialect: Option<Ident>,
    pub triggers: bool,
    pub rename_all: Option<RenameRule>,
}

impl ContainerAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for item in orm_items(attrs)? {
            match item.name.to_string().as_str() {
                "entity" | "table" => {
                    let entity = parse_sql_ident(item.string()?, "entity")?;
                    set_once(&mut out.entity, entity, &item)?;
                }
                "schema" => {
                    let schema = parse_sql_ident(item.string()?, "schema")?;
                    set_once(&mut out.schema, schema, &item)?;
                }
                "dialect" => {
                    let dialect = parse_dialect(item.string()?)?;
                    set_once(&mut out.dialect, dialect, &item)?;
                }
                "triggers" => set_flag(&mut out.triggers, &item)?,
                "rename_all" => {
                    let rule = RenameRule::parse(item.string()?)?;
                    set_once(&mut out.rename_all, rule, &item)?;
                }
                _ => {
                    return Err(unknown(
                        &item,
                        "entity, table, schema, dialect, triggers, rename_all",
                    ));
                }
            }
        }
        Ok(out)
    }
}

fn parse_dialect(lit: &LitStr) -> Result<Ident> {
    let variant = match lit.value().trim().to_ascii_lowercase().as_str() {
        "sqlserver" | "mssql" | "tsql" => "SqlServer",
        "postgres" | "postgresql" | "pg" => "PostgreSql",
        "mysql" => "MySql",
        other => {
            return Err(Error::new(
                lit.span(),
                format!("unknown SQL dialect '{other}' (expected sqlserver, postgresql or mysql)"),
            ));
        }
    };
    Ok(Ident::new(variant, lit.span()))
}

/// Field-level attributes.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub key: bool,
    pub identity: bool,
    pub default: bool,
    pub ignore: bool,
    pub skip: bool,
    pub read_only: bool,
    pub column: Option<String>,
}

impl FieldAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for item in orm_items(attrs)? {
            match item.name.to_string().as_str() {
                "key" | "id" => set_flag(&mut out.key, &item)?,
                "identity" => set_flag(&mut out.identity, &item)?,
                "default" => set_flag(&mut out.default, &item)?,
                "ignore" => set_flag(&mut out.ignore, &item)?,
                "skip" => set_flag(&mut out.skip, &item)?,
                "read_only" => set_flag(&mut out.read_only, &item)?,
                "column" | "rename" => {
                    let column = parse_sql_ident(item.string()?, "column")?;
                    set_once(&mut out.column, column, &item)?;
                }
                _ => {
                    return Err(unknown(
                        &item,
                        "key, id, identity, default, ignore, skip, read_only, column, rename",
                    ));
                }
            }
        }
        if out.skip && (out.key || out.identity || out.default || out.ignore || out.read_only) {
            return Err(Error::new(
                Span::call_site(),
                "`skip` removes the field from the mapping and cannot be combined with other attributes",
            ));
        }
        Ok(out)
    }

    /// Property name: explicit `column`, else the field name under `rename_all`.
    pub fn property_name(&self, field: &Ident, rule: Option<RenameRule>, span: Span) -> Result<String> {
        if let Some(column) = &self.column {
            return Ok(column.clone());
        }
        let raw = field.unraw().to_string();
        let name = rule.map_or(raw.clone(), |rule| rule.apply(&raw));
        parse_sql_ident_with_span(&name, span, "property name")
    }
}

/// Enum variant attributes.
#[derive(Default)]
pub(crate) struct VariantAttrs {
    pub rename: Option<String>,
}

impl VariantAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for item in orm_items(attrs)? {
            match item.name.to_string().as_str() {
                "rename" => {
                    let value = item.string()?.value();
                    set_once(&mut out.rename, value, &item)?;
                }
                _ => return Err(unknown(&item, "rename")),
            }
        }
        Ok(out)
    }
}

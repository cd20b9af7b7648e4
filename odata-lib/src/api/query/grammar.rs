//! OData URI generation.
//!
//! [`compile`] turns a [`QueryDescriptor`] into a URI relative to the service
//! root. Components are emitted in a fixed order:
//!
//! ```text
//! EntitySet(key)/$count?$select=..&$filter=..&$expand=..&$orderby=..&$skip=..&$skiptoken=..&$top=..&$count=true&custom=..
//! ```

use uuid::Uuid;

use crate::error::Error;
use crate::model::EntityKey;
use crate::model::Value;

use super::Clause;
use super::Condition;
use super::Direction;
use super::Expand;
use super::LambdaKind;
use super::QueryDescriptor;
use super::literal::PATH_RESERVED;
use super::literal::QUERY_RESERVED;
use super::literal::encode_reserved;
use super::literal::prepare_value;

/// Compiles a query descriptor into a relative request URI.
///
/// Fails only when the descriptor cannot address anything: no entity set, or
/// a key with no usable value.
///
/// Characters that would end or alter an option value (`&`, `+`, `#`, a bare
/// `%`) are percent-encoded; everything else is left readable.
pub fn compile(query: &QueryDescriptor) -> Result<String, Error> {
    let entity_set = match query.entity_set.as_deref() {
        Some(set) if !set.is_empty() => set,
        _ => return Err(Error::compile("no entity set to address")),
    };

    let mut uri = String::from(entity_set);
    if let Some(key) = &query.entity_key {
        uri.push_str(&encode_reserved(&compile_key(key)?, PATH_RESERVED));
    } else if query.count_only {
        uri.push_str("/$count");
    }

    let options = query_options(query);
    if !options.is_empty() {
        uri.push('?');
        uri.push_str(&options.join("&"));
    }

    Ok(uri)
}

fn query_options(query: &QueryDescriptor) -> Vec<String> {
    let mut options = Vec::new();
    let full = !query.count_only;
    let collection = query.entity_key.is_none();

    if full && !query.select.is_empty() {
        options.push(option("$select", &query.select.join(",")));
    }

    let filter = compile_filter(&query.clauses);
    if !filter.is_empty() {
        options.push(option("$filter", &filter));
    }

    if full {
        if !query.expands.is_empty() {
            options.push(option("$expand", &compile_expands(&query.expands)));
        }
        if !query.orders.is_empty() {
            options.push(option("$orderby", &compile_orders(&query.orders)));
        }
        if let Some(skip) = query.skip {
            options.push(format!("$skip={}", skip));
        }
        if let Some(token) = &query.skip_token {
            options.push(option("$skiptoken", token));
        }
        if collection {
            if let Some(top) = query.top {
                options.push(format!("$top={}", top));
            }
            if query.include_count {
                options.push("$count=true".to_string());
            }
        }
    }

    for (key, value) in &query.custom_options {
        options.push(option(key, value));
    }

    options
}

/// `name=value` with the reserved characters of `value` encoded.
fn option(name: &str, value: &str) -> String {
    format!("{}={}", name, encode_reserved(value, QUERY_RESERVED))
}

/// Renders the parenthesised key segment: `(5)`, `('abc')`, `(a=1,b='x')`.
pub fn compile_key(key: &EntityKey) -> Result<String, Error> {
    match key {
        EntityKey::Single(value) => Ok(format!("({})", key_literal(value)?)),
        EntityKey::Composite(parts) => {
            if parts.is_empty() {
                return Err(Error::compile("composite key has no properties"));
            }
            let parts = parts
                .iter()
                .map(|(name, value)| Ok(format!("{}={}", name, key_literal(value)?)))
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(format!("({})", parts.join(",")))
        }
    }
}

fn key_literal(value: &Value) -> Result<String, Error> {
    match value {
        v if v.is_null() => Err(Error::compile("entity key values cannot be null")),
        Value::String(s) if Uuid::parse_str(s).is_ok() => Ok(s.clone()),
        other => Ok(prepare_value(other)),
    }
}

/// Renders a `$filter` body. The leading clause's boolean is dropped and
/// empty nested groups are skipped.
pub fn compile_filter(clauses: &[Clause]) -> String {
    compile_clauses(clauses, &Scope::root())
}

pub(crate) fn compile_orders(orders: &[(String, Direction)]) -> String {
    orders
        .iter()
        .map(|(field, direction)| format!("{} {}", field, direction.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn compile_expands(expands: &[Expand]) -> String {
    expands
        .iter()
        .map(Expand::to_odata)
        .collect::<Vec<_>>()
        .join(",")
}

/// Lambda context a clause is compiled in.
struct Scope {
    /// Variable bare properties are qualified with.
    prefix: Option<String>,
    /// Variables bound by enclosing lambdas.
    bound: Vec<String>,
}

impl Scope {
    fn root() -> Self {
        Self {
            prefix: None,
            bound: Vec::new(),
        }
    }

    fn property(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        }
    }

    /// Picks a variable for a lambda over `navigation`: the lowercase first
    /// letter of its last segment, suffixed `1`, `2`, ... while taken.
    fn variable_for(&self, navigation: &str) -> String {
        let segment = navigation.rsplit('/').next().unwrap_or(navigation);
        let base = match segment.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => c.to_ascii_lowercase().to_string(),
            _ => "x".to_string(),
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.bound.contains(&candidate) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    fn enter(&self, variable: &str) -> Self {
        let mut bound = self.bound.clone();
        bound.push(variable.to_string());
        Self {
            prefix: Some(variable.to_string()),
            bound,
        }
    }
}

fn compile_clauses(clauses: &[Clause], scope: &Scope) -> String {
    let mut out = String::new();
    for clause in clauses {
        let Some(fragment) = compile_condition(&clause.condition, scope) else {
            continue;
        };
        if !out.is_empty() {
            out.push(' ');
            out.push_str(clause.boolean.as_str());
            out.push(' ');
        }
        out.push_str(&fragment);
    }
    out
}

fn compile_condition(condition: &Condition, scope: &Scope) -> Option<String> {
    let fragment = match condition {
        Condition::Basic {
            column,
            operator,
            value,
        } => format!(
            "{} {} {}",
            scope.property(column),
            operator,
            prepare_value(value)
        ),
        Condition::Function {
            function,
            column,
            value,
        } => format!(
            "{}({},{})",
            function.as_str(),
            scope.property(column),
            prepare_value(value)
        ),
        Condition::Column {
            first,
            operator,
            second,
        } => format!(
            "{} {} {}",
            scope.property(first),
            operator,
            scope.property(second)
        ),
        Condition::Null { column, negated } => {
            let operator = if *negated { "ne" } else { "eq" };
            format!("{} {} null", scope.property(column), operator)
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                return Some(if *negated { "true" } else { "false" }.to_string());
            }
            let column = scope.property(column);
            let disjunction = values
                .iter()
                .map(|value| format!("{} eq {}", column, prepare_value(value)))
                .collect::<Vec<_>>()
                .join(" or ");
            if *negated {
                format!("not ({})", disjunction)
            } else {
                format!("({})", disjunction)
            }
        }
        Condition::Nested { clauses, negated } => {
            let body = compile_clauses(clauses, scope);
            if body.is_empty() {
                return None;
            }
            if *negated {
                format!("not ({})", body)
            } else {
                format!("({})", body)
            }
        }
        Condition::Lambda {
            navigation,
            kind,
            clauses,
        } => {
            let variable = scope.variable_for(navigation);
            let path = scope.property(navigation);
            let body = compile_clauses(clauses, &scope.enter(&variable));
            match (kind, body.is_empty()) {
                (LambdaKind::Any, true) => format!("{}/any()", path),
                (LambdaKind::All, true) => format!("{}/all({}: true)", path, variable),
                (kind, false) => format!("{}/{}({}: {})", path, kind.as_str(), variable, body),
            }
        }
        Condition::Raw(expression) => {
            if expression.trim().is_empty() {
                return None;
            }
            expression.clone()
        }
    };
    Some(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::query::Boolean;
    use crate::api::query::Operator;
    use crate::api::query::StringFunction;

    fn basic(column: &str, operator: Operator, value: impl Into<Value>) -> Condition {
        Condition::Basic {
            column: column.to_string(),
            operator,
            value: value.into(),
        }
    }

    fn with_clauses(clauses: Vec<Clause>) -> QueryDescriptor {
        QueryDescriptor {
            clauses,
            ..QueryDescriptor::new("People")
        }
    }

    #[test]
    fn test_entity_set_only() {
        assert_eq!(compile(&QueryDescriptor::new("People")).unwrap(), "People");
    }

    #[test]
    fn test_select() {
        let query = QueryDescriptor {
            select: vec!["a".to_string(), "b".to_string()],
            ..QueryDescriptor::new("People")
        };
        assert_eq!(compile(&query).unwrap(), "People?$select=a,b");
    }

    #[test]
    fn test_missing_entity_set() {
        let err = compile(&QueryDescriptor::default()).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn test_leading_boolean_is_dropped() {
        let query = with_clauses(vec![
            Clause::and(basic("A", Operator::Eq, 1)),
            Clause::or(basic("B", Operator::Eq, 2)),
        ]);
        assert_eq!(compile(&query).unwrap(), "People?$filter=A eq 1 or B eq 2");

        let query = with_clauses(vec![Clause::or(basic("A", Operator::Gt, 1))]);
        assert_eq!(compile(&query).unwrap(), "People?$filter=A gt 1");
    }

    #[test]
    fn test_function_and_column_conditions() {
        let body = compile_filter(&[
            Clause::and(Condition::Function {
                function: StringFunction::Contains,
                column: "Name".to_string(),
                value: "Corp".into(),
            }),
            Clause::and(Condition::Column {
                first: "Budget".to_string(),
                operator: Operator::Gt,
                second: "Spent".to_string(),
            }),
        ]);
        assert_eq!(body, "contains(Name,'Corp') and Budget gt Spent");
    }

    #[test]
    fn test_in_conditions() {
        let values = vec![Value::from(1), Value::from(2)];
        let body = compile_filter(&[Clause::and(Condition::In {
            column: "Id".to_string(),
            values: values.clone(),
            negated: false,
        })]);
        assert_eq!(body, "(Id eq 1 or Id eq 2)");

        let body = compile_filter(&[Clause::and(Condition::In {
            column: "Id".to_string(),
            values,
            negated: true,
        })]);
        assert_eq!(body, "not (Id eq 1 or Id eq 2)");

        let empty = |negated| {
            compile_filter(&[Clause::and(Condition::In {
                column: "Id".to_string(),
                values: Vec::new(),
                negated,
            })])
        };
        assert_eq!(empty(false), "false");
        assert_eq!(empty(true), "true");
    }

    #[test]
    fn test_nested_groups() {
        let body = compile_filter(&[
            Clause::and(basic("A", Operator::Eq, 1)),
            Clause::and(Condition::Nested {
                clauses: vec![
                    Clause::and(basic("B", Operator::Eq, 2)),
                    Clause::or(basic("C", Operator::Eq, 3)),
                ],
                negated: false,
            }),
            Clause::or(Condition::Nested {
                clauses: vec![Clause::and(basic("D", Operator::Lt, 4))],
                negated: true,
            }),
        ]);
        assert_eq!(body, "A eq 1 and (B eq 2 or C eq 3) or not (D lt 4)");
    }

    #[test]
    fn test_empty_nested_group_is_skipped() {
        let body = compile_filter(&[
            Clause::and(Condition::Nested {
                clauses: Vec::new(),
                negated: false,
            }),
            Clause::or(basic("A", Operator::Eq, 1)),
        ]);
        assert_eq!(body, "A eq 1");
    }

    #[test]
    fn test_lambda_any() {
        let body = compile_filter(&[Clause::and(Condition::Lambda {
            navigation: "Orders".to_string(),
            kind: LambdaKind::Any,
            clauses: vec![Clause::and(basic("Status", Operator::Eq, "Completed"))],
        })]);
        assert_eq!(body, "Orders/any(o: o/Status eq 'Completed')");
    }

    #[test]
    fn test_nested_lambdas_use_distinct_variables() {
        let inner = Condition::Lambda {
            navigation: "Options".to_string(),
            kind: LambdaKind::All,
            clauses: vec![Clause::and(basic("Price", Operator::Gt, 5))],
        };
        let body = compile_filter(&[Clause::and(Condition::Lambda {
            navigation: "Orders".to_string(),
            kind: LambdaKind::Any,
            clauses: vec![
                Clause::and(Condition::Null {
                    column: "ShippedAt".to_string(),
                    negated: true,
                }),
                Clause::and(inner),
            ],
        })]);
        assert_eq!(
            body,
            "Orders/any(o: o/ShippedAt ne null and o/Options/all(o1: o1/Price gt 5))"
        );
    }

    #[test]
    fn test_lambda_variable_from_last_segment() {
        let body = compile_filter(&[Clause::and(Condition::Lambda {
            navigation: "Trips/PlanItems".to_string(),
            kind: LambdaKind::Any,
            clauses: vec![Clause::and(Condition::Raw("true".to_string()))],
        })]);
        assert_eq!(body, "Trips/PlanItems/any(p: true)");

        let body = compile_filter(&[Clause::and(Condition::Lambda {
            navigation: "_links".to_string(),
            kind: LambdaKind::Any,
            clauses: vec![Clause::and(basic("Rel", Operator::Eq, "self"))],
        })]);
        assert_eq!(body, "_links/any(x: x/Rel eq 'self')");
    }

    #[test]
    fn test_empty_lambda_bodies() {
        let lambda = |kind| {
            compile_filter(&[Clause::and(Condition::Lambda {
                navigation: "Orders".to_string(),
                kind,
                clauses: Vec::new(),
            })])
        };
        assert_eq!(lambda(LambdaKind::Any), "Orders/any()");
        assert_eq!(lambda(LambdaKind::All), "Orders/all(o: true)");
    }

    #[test]
    fn test_keys() {
        let keyed = |key: EntityKey| {
            compile(&QueryDescriptor {
                entity_key: Some(key),
                ..QueryDescriptor::new("People")
            })
            .unwrap()
        };
        assert_eq!(keyed(5.into()), "People(5)");
        assert_eq!(keyed("abc".into()), "People('abc')");
        assert_eq!(
            keyed("c2a3c4a5-0000-4000-8000-000000000001".into()),
            "People(c2a3c4a5-0000-4000-8000-000000000001)"
        );
        assert_eq!(
            keyed(EntityKey::composite([("a", 1.into()), ("b", "x".into())])),
            "People(a=1,b='x')"
        );
    }

    #[test]
    fn test_invalid_keys() {
        let keyed = |key: EntityKey| {
            compile(&QueryDescriptor {
                entity_key: Some(key),
                ..QueryDescriptor::new("People")
            })
        };
        assert!(matches!(keyed(Value::Null.into()), Err(Error::Compile(_))));
        assert!(matches!(
            keyed(EntityKey::Composite(Vec::new())),
            Err(Error::Compile(_))
        ));
        assert!(matches!(
            keyed(EntityKey::composite([("a", Value::Null)])),
            Err(Error::Compile(_))
        ));
    }

    #[test]
    fn test_key_suppresses_top_and_count() {
        let query = QueryDescriptor {
            entity_key: Some(5.into()),
            top: Some(10),
            include_count: true,
            select: vec!["Name".to_string()],
            ..QueryDescriptor::new("People")
        };
        assert_eq!(compile(&query).unwrap(), "People(5)?$select=Name");
    }

    #[test]
    fn test_key_suppresses_count_segment() {
        let query = QueryDescriptor {
            entity_key: Some(5.into()),
            count_only: true,
            clauses: vec![Clause::and(basic("Age", Operator::Gt, 30))],
            ..QueryDescriptor::new("People")
        };
        assert_eq!(compile(&query).unwrap(), "People(5)?$filter=Age gt 30");
    }

    #[test]
    fn test_reserved_characters_in_values_are_encoded() {
        let query = with_clauses(vec![
            Clause::and(basic("Name", Operator::Eq, "C#")),
            Clause::or(basic("Name", Operator::Eq, "A&B=1")),
            Clause::or(basic("Name", Operator::Eq, "a+b")),
        ]);
        assert_eq!(
            compile(&query).unwrap(),
            "People?$filter=Name eq 'C%23' or Name eq 'A%26B=1' or Name eq 'a%2Bb'"
        );

        let query = QueryDescriptor {
            entity_key: Some("a#b".into()),
            custom_options: vec![("tag".to_string(), "x&y".to_string())],
            ..QueryDescriptor::new("People")
        };
        assert_eq!(compile(&query).unwrap(), "People('a%23b')?tag=x%26y");
    }

    #[test]
    fn test_encoded_datetime_is_not_encoded_twice() {
        let query = with_clauses(vec![Clause::and(basic(
            "Created",
            Operator::Gt,
            "2024-01-01T00%3A00%3A00Z",
        ))]);
        assert_eq!(
            compile(&query).unwrap(),
            "People?$filter=Created gt 2024-01-01T00%3A00%3A00Z"
        );
    }

    #[test]
    fn test_component_order() {
        let query = QueryDescriptor {
            select: vec!["Name".to_string()],
            clauses: vec![Clause::and(basic("Age", Operator::Ge, 21))],
            expands: vec![Expand::new("Friends")],
            orders: vec![("Name".to_string(), Direction::Desc)],
            skip: Some(20),
            skip_token: Some("abc".to_string()),
            top: Some(10),
            include_count: true,
            custom_options: vec![("debug".to_string(), "1".to_string())],
            ..QueryDescriptor::new("People")
        };
        assert_eq!(
            compile(&query).unwrap(),
            "People?$select=Name&$filter=Age ge 21&$expand=Friends&$orderby=Name desc\
             &$skip=20&$skiptoken=abc&$top=10&$count=true&debug=1"
        );
    }

    #[test]
    fn test_count_only_keeps_filter_and_custom_options() {
        let query = QueryDescriptor {
            count_only: true,
            select: vec!["Name".to_string()],
            clauses: vec![Clause::new(Boolean::And, basic("Age", Operator::Gt, 30))],
            orders: vec![("Name".to_string(), Direction::Asc)],
            top: Some(3),
            custom_options: vec![("tenant".to_string(), "x".to_string())],
            ..QueryDescriptor::new("People")
        };
        assert_eq!(
            compile(&query).unwrap(),
            "People/$count?$filter=Age gt 30&tenant=x"
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let query = with_clauses(vec![Clause::and(basic("A", Operator::Eq, "x"))]);
        assert_eq!(compile(&query).unwrap(), compile(&query).unwrap());
    }
}

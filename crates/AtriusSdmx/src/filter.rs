//! # Attribute Filters
//!
//! A closed filter model plus a parser for the ECQL subset that query
//! engines hand to the store:
//!
//! ```text
//! MSTP = 'TOT' AND AGE = 'TOT' AND REGION IN ('1', '2', '3', '4')
//! ```
//!
//! The model is richer than what can be expressed as a constraint key
//! (comparisons, `LIKE`, `BETWEEN`, `NOT`). Those variants exist so they can
//! be parsed and then rejected explicitly by the translator.
//!
//! ## Grammar
//!
//! ```text
//! filter      := conjunction ( OR conjunction )*
//! conjunction := unary ( AND unary )*
//! unary       := NOT* atom
//! atom        := INCLUDE | EXCLUDE | predicate | '(' filter ')'
//! predicate   := ident ( op literal
//!                      | [NOT] IN '(' literal, ... ')'
//!                      | [NOT] LIKE string
//!                      | [NOT] BETWEEN literal AND literal )
//! op          := = | <> | != | < | <= | > | >=
//! literal     := 'string' | number
//! ```
//!
//! Keywords are case-insensitive; a quote inside a string is written `''`.

use std::fmt;
use std::str::FromStr;

use chumsky::Parser;
use chumsky::error::Rich;
use chumsky::prelude::*;

use crate::{Result, SdmxError};

/// Comparison operators other than equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::Less => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }
}

/// A generic attribute filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches everything
    Include,
    /// Matches nothing
    Exclude,
    /// `attribute = 'value'`
    Equals { attribute: String, value: String },
    /// `attribute IN ('a', 'b')`
    In {
        attribute: String,
        values: Vec<String>,
    },
    /// `attribute < value` and friends
    Compare {
        attribute: String,
        op: ComparisonOp,
        value: String,
    },
    Like { attribute: String, pattern: String },
    Between {
        attribute: String,
        low: String,
        high: String,
    },
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, S>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::In {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    write!(f, "'{}'", value.replace('\'', "''"))
}

fn write_nested(f: &mut fmt::Formatter<'_>, filter: &Filter) -> fmt::Result {
    match filter {
        Filter::And(_) | Filter::Or(_) => write!(f, "({})", filter),
        _ => write!(f, "{}", filter),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Include => write!(f, "INCLUDE"),
            Filter::Exclude => write!(f, "EXCLUDE"),
            Filter::Equals { attribute, value } => {
                write!(f, "{} = ", attribute)?;
                write_literal(f, value)
            }
            Filter::In { attribute, values } => {
                write!(f, "{} IN (", attribute)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_literal(f, value)?;
                }
                write!(f, ")")
            }
            Filter::Compare {
                attribute,
                op,
                value,
            } => {
                write!(f, "{} {} ", attribute, op.symbol())?;
                write_literal(f, value)
            }
            Filter::Like { attribute, pattern } => {
                write!(f, "{} LIKE ", attribute)?;
                write_literal(f, pattern)
            }
            Filter::Between {
                attribute,
                low,
                high,
            } => {
                write!(f, "{} BETWEEN ", attribute)?;
                write_literal(f, low)?;
                write!(f, " AND ")?;
                write_literal(f, high)
            }
            Filter::Not(inner) => {
                write!(f, "NOT ")?;
                match inner.as_ref() {
                    Filter::Include | Filter::Exclude | Filter::Not(_) => write!(f, "{}", inner),
                    other => write!(f, "({})", other),
                }
            }
            Filter::And(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write_nested(f, item)?;
                }
                Ok(())
            }
            Filter::Or(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write_nested(f, item)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Filter {
    type Err = SdmxError;

    fn from_str(s: &str) -> Result<Self> {
        parse_filter(s)
    }
}

/// Parses an ECQL-style filter.
///
/// # Examples
///
/// ```rust
/// use atrius_sdmx::{Filter, parse_filter};
///
/// let filter = parse_filter("AGE = 'TOT' and REGION in ('1', '2')").unwrap();
/// assert_eq!(
///     filter,
///     Filter::and([Filter::equals("AGE", "TOT"), Filter::is_in("REGION", ["1", "2"])])
/// );
/// ```
pub fn parse_filter(text: &str) -> Result<Filter> {
    filter_parser().parse(text).into_result().map_err(|errors| {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        SdmxError::FilterParse(format!("'{}': {}", text, details.join("; ")))
    })
}

type ParserError<'src> = extra::Err<Rich<'src, char>>;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "like", "between", "include", "exclude",
];

// Tail of a predicate, once the attribute name has been read.
#[derive(Debug, Clone)]
enum Predicate {
    Equals(String),
    Compare(ComparisonOp, String),
    In { negated: bool, values: Vec<String> },
    Like { negated: bool, pattern: String },
    Between {
        negated: bool,
        low: String,
        high: String,
    },
}

impl Predicate {
    fn into_filter(self, attribute: String) -> Filter {
        let (filter, negated) = match self {
            Predicate::Equals(value) => (Filter::Equals { attribute, value }, false),
            Predicate::Compare(op, value) => (
                Filter::Compare {
                    attribute,
                    op,
                    value,
                },
                false,
            ),
            Predicate::In { negated, values } => (Filter::In { attribute, values }, negated),
            Predicate::Like { negated, pattern } => (Filter::Like { attribute, pattern }, negated),
            Predicate::Between { negated, low, high } => (
                Filter::Between {
                    attribute,
                    low,
                    high,
                },
                negated,
            ),
        };
        if negated { Filter::negate(filter) } else { filter }
    }
}

fn keyword<'src>(word: &'static str) -> impl Parser<'src, &'src str, (), ParserError<'src>> + Clone {
    text::ident()
        .filter(move |s: &&str| s.eq_ignore_ascii_case(word))
        .ignored()
        .padded()
}

fn attribute_name<'src>() -> impl Parser<'src, &'src str, String, ParserError<'src>> + Clone {
    text::ident()
        .try_map(|name: &str, span| {
            if KEYWORDS.iter().any(|k| name.eq_ignore_ascii_case(k)) {
                Err(Rich::custom(span, format!("unexpected keyword '{}'", name)))
            } else {
                Ok(name.to_string())
            }
        })
        .padded()
}

fn string_literal<'src>() -> impl Parser<'src, &'src str, String, ParserError<'src>> + Clone {
    just('\'')
        .ignore_then(
            just("''")
                .to('\'')
                .or(none_of("'"))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('\''))
        .padded()
}

fn literal<'src>() -> impl Parser<'src, &'src str, String, ParserError<'src>> + Clone {
    let number = just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(|digits: &str| digits.to_string())
        .padded();

    string_literal().or(number)
}

fn filter_parser<'src>() -> impl Parser<'src, &'src str, Filter, ParserError<'src>> + Clone {
    let operator = choice((
        just("<=").to(Some(ComparisonOp::LessOrEqual)),
        just(">=").to(Some(ComparisonOp::GreaterOrEqual)),
        just("<>").to(Some(ComparisonOp::NotEqual)),
        just("!=").to(Some(ComparisonOp::NotEqual)),
        just("<").to(Some(ComparisonOp::Less)),
        just(">").to(Some(ComparisonOp::Greater)),
        just("=").to(None),
    ))
    .padded();

    let comparison = operator.then(literal()).map(|(op, value)| match op {
        Some(op) => Predicate::Compare(op, value),
        None => Predicate::Equals(value),
    });

    let negation = keyword("not").or_not().map(|n| n.is_some());

    let membership = negation
        .clone()
        .then_ignore(keyword("in"))
        .then(
            literal()
                .separated_by(just(',').padded())
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just('(').padded(), just(')').padded()),
        )
        .map(|(negated, values)| Predicate::In { negated, values });

    let like = negation
        .clone()
        .then_ignore(keyword("like"))
        .then(string_literal())
        .map(|(negated, pattern)| Predicate::Like { negated, pattern });

    let between = negation
        .then_ignore(keyword("between"))
        .then(literal())
        .then_ignore(keyword("and"))
        .then(literal())
        .map(|((negated, low), high)| Predicate::Between { negated, low, high });

    let predicate = attribute_name()
        .then(choice((comparison, membership, like, between)))
        .map(|(attribute, predicate)| predicate.into_filter(attribute))
        .boxed();

    recursive(|filter| {
        let atom = choice((
            keyword("include").to(Filter::Include),
            keyword("exclude").to(Filter::Exclude),
            predicate.clone(),
            filter
                .clone()
                .delimited_by(just('(').padded(), just(')').padded()),
        ))
        .boxed();

        let unary = keyword("not")
            .repeated()
            .collect::<Vec<()>>()
            .then(atom)
            .map(|(nots, filter)| nots.iter().fold(filter, |acc, _| Filter::negate(acc)));

        let conjunction = unary
            .separated_by(keyword("and"))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|mut items| {
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Filter::And(items)
                }
            })
            .boxed();

        conjunction
            .separated_by(keyword("or"))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|mut items| {
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Filter::Or(items)
                }
            })
            .boxed()
    })
    .padded()
    .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_equality_conjunction() {
        let filter = parse_filter("MSTP='TOT' and AGE='TOT' and FREQUENCY='A'").unwrap();
        assert_eq!(
            filter,
            Filter::and([
                Filter::equals("MSTP", "TOT"),
                Filter::equals("AGE", "TOT"),
                Filter::equals("FREQUENCY", "A"),
            ])
        );
    }

    #[test]
    fn test_parse_in_list_and_numbers() {
        let filter = parse_filter("REGION in ('1','2', '3' ,'4') AND STATE = 1").unwrap();
        assert_eq!(
            filter,
            Filter::and([
                Filter::is_in("REGION", ["1", "2", "3", "4"]),
                Filter::equals("STATE", "1"),
            ])
        );
    }

    #[test]
    fn test_parse_or_group() {
        let filter = parse_filter("STATE = '1' OR STATE = '2'").unwrap();
        assert_eq!(
            filter,
            Filter::or([Filter::equals("STATE", "1"), Filter::equals("STATE", "2")])
        );
    }

    #[test]
    fn test_parse_parenthesized_or_inside_and() {
        let filter = parse_filter("AGE = 'TOT' and (STATE = '1' or STATE = '2')").unwrap();
        assert_eq!(
            filter,
            Filter::and([
                Filter::equals("AGE", "TOT"),
                Filter::or([Filter::equals("STATE", "1"), Filter::equals("STATE", "2")]),
            ])
        );
    }

    #[test]
    fn test_parse_unsupported_constructs_still_parse() {
        assert_eq!(
            parse_filter("NOT AGE = 'TOT'").unwrap(),
            Filter::negate(Filter::equals("AGE", "TOT"))
        );
        assert_eq!(
            parse_filter("AGE not in ('A')").unwrap(),
            Filter::negate(Filter::is_in("AGE", ["A"]))
        );
        assert_eq!(
            parse_filter("YEAR between 2001 and 2011").unwrap(),
            Filter::Between {
                attribute: "YEAR".to_string(),
                low: "2001".to_string(),
                high: "2011".to_string(),
            }
        );
        assert_eq!(
            parse_filter("AGE >= '15'").unwrap(),
            Filter::Compare {
                attribute: "AGE".to_string(),
                op: ComparisonOp::GreaterOrEqual,
                value: "15".to_string(),
            }
        );
        assert_eq!(
            parse_filter("NAME like 'Syd%'").unwrap(),
            Filter::Like {
                attribute: "NAME".to_string(),
                pattern: "Syd%".to_string(),
            }
        );
        assert_eq!(parse_filter("include").unwrap(), Filter::Include);
    }

    #[test]
    fn test_parse_escaped_quote() {
        let filter = parse_filter("NAME = 'O''Brien'").unwrap();
        assert_eq!(filter, Filter::equals("NAME", "O'Brien"));
    }

    #[test]
    fn test_keyword_prefixed_identifiers() {
        let filter = parse_filter("ANDROID = 'x' and ORDER = 'y'").unwrap();
        assert_eq!(
            filter,
            Filter::and([Filter::equals("ANDROID", "x"), Filter::equals("ORDER", "y")])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_filter("AGE ="), Err(SdmxError::FilterParse(_))));
        assert!(matches!(parse_filter("AGE = 'TOT' and"), Err(SdmxError::FilterParse(_))));
        assert!(matches!(parse_filter("in = 'x'"), Err(SdmxError::FilterParse(_))));
        assert!(matches!(parse_filter("REGION in ()"), Err(SdmxError::FilterParse(_))));
    }

    #[test]
    fn test_display_reparses() {
        let filter = Filter::and([
            Filter::equals("NAME", "O'Brien"),
            Filter::or([Filter::equals("STATE", "1"), Filter::is_in("STATE", ["2", "3"])]),
            Filter::negate(Filter::equals("AGE", "TOT")),
        ]);
        let text = filter.to_string();
        assert_eq!(
            text,
            "NAME = 'O''Brien' AND (STATE = '1' OR STATE IN ('2', '3')) AND NOT (AGE = 'TOT')"
        );
        assert_eq!(parse_filter(&text).unwrap(), filter);
    }
}

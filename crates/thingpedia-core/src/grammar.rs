//! Parser for the manifest and dataset language
//!
//! ```text
//! Source → parse() → Library { classes, datasets }
//! ```
//!
//! Class bodies are parsed structurally (imports, entities, function
//! signatures). Example bodies are kept as verbatim text and scanned for
//! primitive invocations; nothing else in a program is interpreted.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1, one_of, satisfy},
    combinator::{all_consuming, cut, map, not, opt, recognize, value},
    error::{context, convert_error, ErrorKind, ParseError as NomParseError, VerboseError},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use crate::ast::*;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Unexpected end of input")]
    Incomplete,
    #[error("Expected a {0} in the source")]
    Missing(&'static str),
}

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

// ============================================================================
// Public API
// ============================================================================

/// Parse a complete source document
pub fn parse(input: &str) -> Result<Library, ParseError> {
    match all_consuming(library)(input) {
        Ok((_, lib)) => Ok(lib),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ParseError::Syntax(convert_error(input, e)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Incomplete),
    }
}

/// Parse a document that must contain at least one class, returning the first
pub fn parse_class(input: &str) -> Result<ClassDef, ParseError> {
    parse(input)?
        .classes
        .into_iter()
        .next()
        .ok_or(ParseError::Missing("class"))
}

/// Parse a document that must contain at least one dataset, returning the first
pub fn parse_dataset(input: &str) -> Result<Dataset, ParseError> {
    parse(input)?
        .datasets
        .into_iter()
        .next()
        .ok_or(ParseError::Missing("dataset"))
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whitespace and comments
fn ws(input: &str) -> Res<'_, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(tag("//"), take_while(|c| c != '\n'))),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

fn lex<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    preceded(ws, inner)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    terminated(tag(kw), not(satisfy(is_ident_char)))
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// `@com.example.foo`, returned without the `@`
fn class_name(input: &str) -> Res<'_, String> {
    map(
        preceded(
            char('@'),
            recognize(separated_list1(char('.'), take_while1(is_name_char))),
        ),
        str::to_string,
    )(input)
}

fn fail<T>(input: &str, kind: ErrorKind) -> Res<'_, T> {
    Err(nom::Err::Failure(VerboseError::from_error_kind(input, kind)))
}

/// Quoted string with backslash escapes
fn quoted(input: &str, quote: char) -> Res<'_, String> {
    let (mut rest, _) = char(quote)(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return fail(rest, ErrorKind::Eof),
            Some(c) if c == quote => return Ok((&rest[c.len_utf8()..], out)),
            Some('\\') => match chars.next() {
                Some(e) => {
                    out.push(match e {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    rest = &rest[1 + e.len_utf8()..];
                }
                None => return fail(rest, ErrorKind::Eof),
            },
            Some(c) => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

fn string_lit(input: &str) -> Res<'_, String> {
    if input.starts_with('\'') {
        quoted(input, '\'')
    } else {
        quoted(input, '"')
    }
}

/// Byte offset just past the matching close paren of a `(` at offset 0
fn balanced_end(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Offset just past the string literal starting at `start`
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Type expression, kept verbatim: `String`, `Entity(tt:picture)`, `Array(Compound(...))`
fn type_expr(input: &str) -> Res<'_, String> {
    let (input, _) = ws(input)?;
    let (rest, _) = identifier(input)?;
    let rest = if rest.starts_with('(') {
        match balanced_end(rest) {
            Some(end) => &rest[end..],
            None => return fail(rest, ErrorKind::Char),
        }
    } else {
        rest
    };
    let text = &input[..input.len() - rest.len()];
    Ok((rest, text.to_string()))
}

// ============================================================================
// Values
// ============================================================================

fn number_or_measure(input: &str) -> Res<'_, Value> {
    let (input, digits) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let number: f64 = match digits.parse() {
        Ok(n) => n,
        Err(_) => return fail(input, ErrorKind::Float),
    };
    let (input, unit) = opt(recognize(pair(alpha1, many0(alt((alphanumeric1, tag("_")))))))(input)?;
    Ok((
        input,
        match unit {
            Some(unit) => Value::Measure(number, unit.to_string()),
            None => Value::Number(number),
        },
    ))
}

fn string_or_entity(input: &str) -> Res<'_, Value> {
    let (input, s) = string_lit(input)?;
    let (input, entity_type) = opt(preceded(
        tag("^^"),
        take_while1(|c: char| is_name_char(c) || c == '.' || c == ':'),
    ))(input)?;
    Ok((
        input,
        match entity_type {
            Some(t) => Value::Entity {
                value: s,
                entity_type: t.to_string(),
            },
            None => Value::String(s),
        },
    ))
}

fn arg_map(input: &str) -> Res<'_, Value> {
    let (input, _) = keyword("makeArgMap")(input)?;
    let (input, entries) = cut(delimited(
        lex(char('(')),
        separated_list0(
            lex(char(',')),
            pair(
                map(lex(identifier), str::to_string),
                preceded(lex(char(':')), type_expr),
            ),
        ),
        lex(char(')')),
    ))(input)?;
    Ok((input, Value::ArgMap(entries)))
}

fn array(input: &str) -> Res<'_, Value> {
    map(
        delimited(
            char('['),
            terminated(
                separated_list0(lex(char(',')), value_expr),
                opt(lex(char(','))),
            ),
            cut(lex(char(']'))),
        ),
        Value::Array,
    )(input)
}

fn object(input: &str) -> Res<'_, Value> {
    map(
        delimited(
            char('{'),
            terminated(
                separated_list0(lex(char(',')), named_value),
                opt(lex(char(','))),
            ),
            cut(lex(char('}'))),
        ),
        Value::Object,
    )(input)
}

fn enum_value(input: &str) -> Res<'_, Value> {
    map(
        preceded(
            keyword("enum"),
            delimited(lex(char('(')), lex(identifier), lex(char(')'))),
        ),
        |name| Value::Enum(name.to_string()),
    )(input)
}

fn value_expr(input: &str) -> Res<'_, Value> {
    preceded(
        ws,
        context(
            "value",
            alt((
                value(Value::Undefined, tag("$?")),
                string_or_entity,
                number_or_measure,
                value(Value::Boolean(true), keyword("true")),
                value(Value::Boolean(false), keyword("false")),
                enum_value,
                arg_map,
                array,
                object,
            )),
        ),
    )(input)
}

/// `name=value`
fn named_value(input: &str) -> Res<'_, (String, Value)> {
    pair(
        map(lex(identifier), str::to_string),
        preceded(lex(char('=')), value_expr),
    )(input)
}

fn arg_list(input: &str) -> Res<'_, Vec<(String, Value)>> {
    separated_list0(lex(char(',')), named_value)(input)
}

// ============================================================================
// Annotations
// ============================================================================

/// Any number of `#_[k=v]` and `#[k=v]` blocks, split into (metadata, annotations)
fn annotations(input: &str) -> Res<'_, (Annotations, Annotations)> {
    let (input, blocks) = many0(preceded(
        ws,
        alt((
            map(
                preceded(tag("#_["), cut(terminated(arg_list, lex(char(']'))))),
                |kvs| (true, kvs),
            ),
            map(
                preceded(tag("#["), cut(terminated(arg_list, lex(char(']'))))),
                |kvs| (false, kvs),
            ),
        )),
    ))(input)?;

    let mut metadata = Annotations::new();
    let mut impl_annotations = Annotations::new();
    for (is_nl, kvs) in blocks {
        let target = if is_nl { &mut metadata } else { &mut impl_annotations };
        for (k, v) in kvs {
            target.insert(k, v);
        }
    }
    Ok((input, (metadata, impl_annotations)))
}

// ============================================================================
// Classes
// ============================================================================

enum Member {
    Import(ImportStmt),
    Entity(EntityDef),
    Function(FunctionDef),
}

fn import_stmt(input: &str) -> Res<'_, ImportStmt> {
    let (input, _) = keyword("import")(input)?;
    let (input, (facet, _, module, args, _, _)) = cut(tuple((
        lex(identifier),
        lex(keyword("from")),
        lex(class_name),
        delimited(lex(char('(')), arg_list, lex(char(')'))),
        ws,
        char(';'),
    )))(input)?;
    Ok((
        input,
        ImportStmt {
            facet: facet.to_string(),
            module,
            args,
        },
    ))
}

fn entity_def(input: &str) -> Res<'_, EntityDef> {
    let (input, _) = keyword("entity")(input)?;
    let (input, (name, (metadata, annotations), _)) =
        cut(tuple((lex(identifier), annotations, lex(char(';')))))(input)?;
    Ok((
        input,
        EntityDef {
            name: name.to_string(),
            metadata,
            annotations,
        },
    ))
}

fn param_direction(input: &str) -> Res<'_, ParamDirection> {
    alt((
        value(
            ParamDirection::InReq,
            pair(keyword("in"), lex(keyword("req"))),
        ),
        value(
            ParamDirection::InOpt,
            pair(keyword("in"), lex(keyword("opt"))),
        ),
        value(ParamDirection::Out, keyword("out")),
    ))(input)
}

fn param_def(input: &str) -> Res<'_, ParamDef> {
    let (input, direction) = lex(param_direction)(input)?;
    let (input, (name, _, type_, (metadata, annotations))) = cut(tuple((
        lex(identifier),
        lex(char(':')),
        type_expr,
        annotations,
    )))(input)?;
    Ok((
        input,
        ParamDef {
            direction,
            name: name.to_string(),
            type_,
            metadata,
            annotations,
        },
    ))
}

fn function_def(input: &str) -> Res<'_, FunctionDef> {
    let (input, flags) = many0(terminated(
        alt((keyword("monitorable"), keyword("list"))),
        ws,
    ))(input)?;
    let (input, kind) = alt((
        value(FunctionKind::Query, keyword("query")),
        value(FunctionKind::Action, keyword("action")),
    ))(input)?;
    let (input, (name, params, (metadata, annotations), _)) = cut(tuple((
        lex(identifier),
        delimited(
            lex(char('(')),
            separated_list0(lex(char(',')), param_def),
            lex(char(')')),
        ),
        annotations,
        lex(char(';')),
    )))(input)?;
    Ok((
        input,
        FunctionDef {
            kind,
            name: name.to_string(),
            is_list: flags.contains(&"list"),
            is_monitorable: flags.contains(&"monitorable"),
            params,
            metadata,
            annotations,
        },
    ))
}

fn class_member(input: &str) -> Res<'_, Member> {
    preceded(
        ws,
        alt((
            map(import_stmt, Member::Import),
            map(entity_def, Member::Entity),
            map(function_def, Member::Function),
        )),
    )(input)
}

fn class_def(input: &str) -> Res<'_, ClassDef> {
    let (input, is_abstract) = opt(terminated(keyword("abstract"), ws))(input)?;
    let (input, _) = keyword("class")(input)?;
    let (input, kind) = cut(context("class name", lex(class_name)))(input)?;
    let (input, extends) = opt(preceded(
        lex(keyword("extends")),
        cut(separated_list1(lex(char(',')), lex(class_name))),
    ))(input)?;
    let (input, (metadata, annotations)) = annotations(input)?;
    let (input, _) = cut(context("class body", lex(char('{'))))(input)?;
    let (input, members) = many0(class_member)(input)?;
    let (input, _) = cut(context("closing brace", lex(char('}'))))(input)?;

    let mut class = ClassDef::new(kind);
    class.is_abstract = is_abstract.is_some();
    class.extends = extends.unwrap_or_default();
    class.metadata = metadata;
    class.annotations = annotations;
    for member in members {
        match member {
            Member::Import(i) => class.imports.push(i),
            Member::Entity(e) => class.entities.push(e),
            Member::Function(f) => class.functions.push(f),
        }
    }
    Ok((input, class))
}

// ============================================================================
// Datasets
// ============================================================================

/// End of a program body: a top-level `;`, annotation block, or closing brace
fn find_body_end(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b'}' if depth == 0 => return i,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => return i,
            b'#' if depth == 0 && (s[i..].starts_with("#_[") || s[i..].starts_with("#[")) => {
                return i
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

const BUILTIN_SELECTORS: &[&str] = &["now", "notify", "return"];

/// Input past any leading whitespace and comments
fn skip_ws(input: &str) -> &str {
    ws(input).map(|(rest, _)| rest).unwrap_or(input)
}

/// `@kind.channel(` or `@kind(attributes).channel(`, whitespace allowed
/// before each `(` and around the `.`
fn device_invocation(name: &str, after: &str) -> Option<Invocation> {
    let after = skip_ws(after);
    if !after.starts_with('(') {
        return None;
    }
    let close = balanced_end(after)?;
    if let Some(rest) = skip_ws(&after[close..]).strip_prefix('.') {
        let rest = skip_ws(rest);
        let channel_len = rest
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(rest.len());
        if channel_len > 0 && skip_ws(&rest[channel_len..]).starts_with('(') {
            let inner = &after[1..close - 1];
            let attributes = all_consuming(terminated(arg_list, ws))(inner)
                .map(|(_, args)| args)
                .unwrap_or_default();
            return Some(Invocation {
                selector: Selector::Device {
                    kind: name.to_string(),
                    attributes,
                },
                channel: rest[..channel_len].to_string(),
            });
        }
    }
    let (kind, channel) = name.rsplit_once('.')?;
    if kind.is_empty() || channel.is_empty() {
        return None;
    }
    Some(Invocation {
        selector: Selector::Device {
            kind: kind.to_string(),
            attributes: Vec::new(),
        },
        channel: channel.to_string(),
    })
}

/// Collect the invocations in a program body, in source order
fn scan_invocations(text: &str) -> Vec<Invocation> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'@' => {
                let rest = &text[i + 1..];
                let name_len = rest
                    .find(|c: char| !(is_name_char(c) || c == '.'))
                    .unwrap_or(rest.len());
                let name = rest[..name_len].trim_end_matches('.');
                if let Some(invocation) = device_invocation(name, &rest[name.len()..]) {
                    out.push(invocation);
                }
                i += 1 + name_len;
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let word_len = text[i..]
                    .find(|c: char| !is_ident_char(c))
                    .unwrap_or(text.len() - i);
                let word = &text[i..i + word_len];
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                if prev != b'.' && prev != b'$' && BUILTIN_SELECTORS.contains(&word) {
                    out.push(Invocation {
                        selector: Selector::Builtin(word.to_string()),
                        channel: word.to_string(),
                    });
                }
                i += word_len;
            }
            _ => i += 1,
        }
    }
    out
}

fn program_body(input: &str) -> Res<'_, ProgramSource> {
    let (input, _) = ws(input)?;
    let end = find_body_end(input);
    let text = input[..end].trim_end();
    if text.is_empty() {
        return fail(input, ErrorKind::Verify);
    }
    Ok((
        &input[end..],
        ProgramSource {
            text: text.to_string(),
            invocations: scan_invocations(text),
        },
    ))
}

fn example_type(input: &str) -> Res<'_, ExampleType> {
    alt((
        value(ExampleType::Query, keyword("query")),
        value(ExampleType::Action, keyword("action")),
        value(ExampleType::Stream, keyword("stream")),
        value(ExampleType::Program, keyword("program")),
    ))(input)
}

fn example(input: &str) -> Res<'_, Example> {
    let (input, type_) = lex(example_type)(input)?;
    let (input, args) = opt(delimited(
        lex(char('(')),
        separated_list0(
            lex(char(',')),
            pair(
                map(lex(identifier), str::to_string),
                preceded(lex(char(':')), type_expr),
            ),
        ),
        lex(char(')')),
    ))(input)?;
    let (input, (_, body, (metadata, annotations), _)) = cut(tuple((
        context("':='", lex(tag(":="))),
        context("program", program_body),
        annotations,
        context("';'", lex(char(';'))),
    )))(input)?;
    Ok((
        input,
        Example {
            type_,
            args: args.unwrap_or_default(),
            body,
            metadata,
            annotations,
        },
    ))
}

fn dataset(input: &str) -> Res<'_, Dataset> {
    let (input, _) = keyword("dataset")(input)?;
    let (input, name) = cut(context("dataset name", lex(class_name)))(input)?;
    let (input, language) = opt(preceded(lex(keyword("language")), cut(lex(string_lit))))(input)?;
    let (input, (_, annotations)) = annotations(input)?;
    let (input, _) = cut(context("dataset body", lex(char('{'))))(input)?;
    let (input, examples) = many0(example)(input)?;
    let (input, _) = cut(context("closing brace", lex(char('}'))))(input)?;
    Ok((
        input,
        Dataset {
            name,
            language: language.unwrap_or_else(|| "en".to_string()),
            examples,
            annotations,
        },
    ))
}

// ============================================================================
// Library
// ============================================================================

enum Item {
    Class(ClassDef),
    Dataset(Dataset),
}

fn library(input: &str) -> Res<'_, Library> {
    let (input, items) = many0(preceded(
        ws,
        alt((map(class_def, Item::Class), map(dataset, Item::Dataset))),
    ))(input)?;
    let (input, _) = ws(input)?;

    let mut lib = Library::default();
    for item in items {
        match item {
            Item::Class(c) => lib.classes.push(c),
            Item::Dataset(d) => lib.datasets.push(d),
        }
    }
    Ok((input, lib))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWITTER: &str = r#"
// Twitter account
class @com.twitter
#_[name="Twitter Account"]
#_[description="Connect your Almond with Twitter"]
#_[canonical="twitter account"]
#[version=3]
#[category="online"] {
  import loader from @org.thingpedia.v2();
  import config from @org.thingpedia.config.oauth2(client_id="abc", profile=["id_str", "screen_name"]);

  entity hashtag #_[description="Hashtags"];

  monitorable list query timeline(out text : String #_[canonical="text"],
                                  out author : Entity(tt:username))
  #_[canonical="timeline on twitter"]
  #[poll_interval=10min];

  action post(in req status : String)
  #_[confirmation="tweet $status"];
}
"#;

    #[test]
    fn test_parse_class() {
        let class = parse_class(TWITTER).unwrap();
        assert_eq!(class.kind, "com.twitter");
        assert!(!class.is_abstract);
        assert_eq!(
            class.metadata.get("name"),
            Some(&Value::String("Twitter Account".to_string()))
        );
        assert_eq!(class.annotations.get("version"), Some(&Value::Number(3.0)));

        let config = class.import("config").unwrap();
        assert_eq!(config.module, "org.thingpedia.config.oauth2");
        assert_eq!(
            config.arg("profile"),
            Some(&Value::Array(vec![
                Value::String("id_str".to_string()),
                Value::String("screen_name".to_string()),
            ]))
        );

        assert_eq!(class.entities.len(), 1);
        assert_eq!(class.functions.len(), 2);
        let timeline = class.function("timeline").unwrap();
        assert!(timeline.is_list && timeline.is_monitorable);
        assert_eq!(timeline.kind, FunctionKind::Query);
        assert_eq!(timeline.params[1].type_, "Entity(tt:username)");
        assert_eq!(
            timeline.annotations.get("poll_interval"),
            Some(&Value::Measure(10.0, "min".to_string()))
        );
        let post = class.function("post").unwrap();
        assert_eq!(post.params[0].direction, ParamDirection::InReq);
    }

    #[test]
    fn test_parse_form_arg_map() {
        let source = r#"
abstract class @com.example.form extends @org.thingpedia.builtin {
  import config from @org.thingpedia.config.form(params=makeArgMap(url:String, password:Password));
}
"#;
        let class = parse_class(source).unwrap();
        assert!(class.is_abstract);
        assert_eq!(class.extends, vec!["org.thingpedia.builtin".to_string()]);
        assert_eq!(
            class.import("config").unwrap().arg("params"),
            Some(&Value::ArgMap(vec![
                ("url".to_string(), "String".to_string()),
                ("password".to_string(), "Password".to_string()),
            ]))
        );
    }

    #[test]
    fn test_parse_dataset() {
        let source = r#"
dataset @org.thingpedia.everything language "en" {
  query := @com.twitter.timeline()
  #_[utterances=["my tweets", "what's on twitter"]]
  #[id=1];

  action (p_status : String) := @com.twitter.post(status=p_status)
  #[id=2];

  program := now => @com.weather.current(location=$?) => notify
  #[id=3];

  query := @com.twitter(id="twitter-foo").timeline(), text =~ "a;b#[c]"
  #[id=4];
}
"#;
        let dataset = parse_dataset(source).unwrap();
        assert_eq!(dataset.name, "org.thingpedia.everything");
        assert_eq!(dataset.language, "en");
        assert_eq!(dataset.examples.len(), 4);

        let e1 = &dataset.examples[0];
        assert_eq!(e1.id(), Some(1));
        assert_eq!(e1.body.text, "@com.twitter.timeline()");
        assert_eq!(e1.utterances(), vec!["my tweets", "what's on twitter"]);

        let e2 = &dataset.examples[1];
        assert_eq!(e2.type_, ExampleType::Action);
        assert_eq!(e2.args, vec![("p_status".to_string(), "String".to_string())]);

        let e3 = &dataset.examples[2];
        let selectors: Vec<_> = e3.iterate_primitives().map(|i| i.selector.clone()).collect();
        assert_eq!(selectors.len(), 3);
        assert_eq!(selectors[0], Selector::Builtin("now".to_string()));
        assert_eq!(selectors[1].kind(), Some("com.weather"));
        assert_eq!(selectors[2], Selector::Builtin("notify".to_string()));

        let e4 = &dataset.examples[3];
        assert_eq!(e4.id(), Some(4));
        assert_eq!(e4.body.invocations.len(), 1);
        assert_eq!(e4.body.invocations[0].channel, "timeline");
        assert_eq!(
            e4.body.invocations[0].selector,
            Selector::Device {
                kind: "com.twitter".to_string(),
                attributes: vec![("id".to_string(), Value::String("twitter-foo".to_string()))],
            }
        );
    }

    #[test]
    fn test_scan_ignores_strings_and_identifiers() {
        let invocations =
            scan_invocations(r#"@com.bing.web_search(query="@com.fake.x()") filter notification == "notify""#);
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].selector.kind(), Some("com.bing"));
        assert_eq!(invocations[0].channel, "web_search");
    }

    #[test]
    fn test_scan_allows_whitespace_in_invocations() {
        let invocations = scan_invocations(
            r#"@com.twitter.timeline () => @com.hue(id="a.b", name="x") . set_power (power=enum on)"#,
        );
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].selector.kind(), Some("com.twitter"));
        assert_eq!(invocations[0].channel, "timeline");
        assert_eq!(invocations[1].selector.kind(), Some("com.hue"));
        assert_eq!(invocations[1].channel, "set_power");
        match &invocations[1].selector {
            Selector::Device { attributes, .. } => assert_eq!(attributes.len(), 2),
            other => panic!("unexpected selector: {:?}", other),
        }

        assert!(scan_invocations("@com.twitter.timeline => notify")
            .iter()
            .all(|i| !i.selector.is_device()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("class @com.foo {"), Err(ParseError::Syntax(_))));
        assert!(matches!(parse("dataset @foo { query := ; }"), Err(ParseError::Syntax(_))));
        assert_eq!(parse_class(""), Err(ParseError::Missing("class")));
        assert_eq!(parse_dataset("class @a.b {}"), Err(ParseError::Missing("dataset")));
    }

    #[test]
    fn test_comments_and_values() {
        let source = r#"
/* block */ class @com.example // trailing
#_[canonical={default="example", base=["example thing"]}]
#[flags=[true, false, -1.5, enum(on), "x"^^tt:hashtag, $?]] {
}
"#;
        let class = parse_class(source).unwrap();
        assert_eq!(
            class.metadata.get("canonical"),
            Some(&Value::Object(vec![
                ("default".to_string(), Value::String("example".to_string())),
                (
                    "base".to_string(),
                    Value::Array(vec![Value::String("example thing".to_string())])
                ),
            ]))
        );
        assert_eq!(
            class.annotations.get("flags"),
            Some(&Value::Array(vec![
                Value::Boolean(true),
                Value::Boolean(false),
                Value::Number(-1.5),
                Value::Enum("on".to_string()),
                Value::Entity {
                    value: "x".to_string(),
                    entity_type: "tt:hashtag".to_string()
                },
                Value::Undefined,
            ]))
        );
    }
}

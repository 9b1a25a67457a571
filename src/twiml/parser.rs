// Call-control document parser using nom combinators

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::value,
    multi::many0,
    sequence::delimited,
    IResult,
};
use std::fmt;

use super::message::{Document, Element, ElementKind, NodeId};

/// Nesting limit; call-control documents are a handful of levels deep.
const MAX_DEPTH: usize = 128;

/// Parse error with descriptive messages
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XML parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

/// Parse a response body into a `Document`.
///
/// Accepts an optional XML declaration, comments, processing instructions
/// and a DOCTYPE around exactly one root element.
pub fn parse_document(input: &str) -> Result<Document, ParseError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let input = skip_misc(input)?;
    if input.is_empty() {
        return Err(ParseError::new("empty document"));
    }

    let mut arena = Vec::new();
    let remaining = parse_element(input, None, &mut arena, 0)?;

    let remaining = skip_misc(remaining)?;
    if !remaining.is_empty() {
        return Err(ParseError::new(format!(
            "unexpected content after root element: {}",
            snippet(remaining)
        )));
    }
    Ok(Document::from_elements(arena))
}

fn snippet(input: &str) -> &str {
    match input.char_indices().nth(20) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// nom parser: an element or attribute name
fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))(input)
}

/// nom parser: a single- or double-quoted attribute value
fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
    ))(input)
}

/// Parse one attribute: WS name WS? = WS? "value"
fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = multispace1(input)?;
    let (input, key) = name(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, val) = quoted(input)?;
    Ok((input, (key, val)))
}

/// Parse a start tag. Returns the name, raw attributes and whether the tag
/// was self-closing.
fn start_tag(input: &str) -> IResult<&str, (&str, Vec<(&str, &str)>, bool)> {
    let (input, _) = char('<')(input)?;
    let (input, tag_name) = name(input)?;
    let (input, attrs) = many0(attribute)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, self_closing) = alt((value(true, tag("/>")), value(false, tag(">"))))(input)?;
    Ok((input, (tag_name, attrs, self_closing)))
}

/// Parse an end tag: </name WS? >
fn end_tag(input: &str) -> IResult<&str, &str> {
    let (input, _) = tag("</")(input)?;
    let (input, tag_name) = name(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('>')(input)?;
    Ok((input, tag_name))
}

/// Consume input up to and including `terminator`
fn skip_past<'a>(input: &'a str, terminator: &'static str) -> Result<&'a str, ParseError> {
    let res: IResult<&str, &str> = take_until(terminator)(input);
    let (rest, _) = res.map_err(|_| ParseError::new(format!("missing '{}'", terminator)))?;
    Ok(&rest[terminator.len()..])
}

/// Skip whitespace, comments, processing instructions and DOCTYPE
fn skip_misc(mut input: &str) -> Result<&str, ParseError> {
    loop {
        input = input.trim_start();
        if input.starts_with("<?") {
            input = skip_past(input, "?>")?;
        } else if input.starts_with("<!--") {
            input = skip_past(input, "-->")?;
        } else if input.starts_with("<!DOCTYPE") {
            input = skip_past(input, ">")?;
        } else {
            return Ok(input);
        }
    }
}

/// Parse one element (and its subtree) into the arena.
fn parse_element<'a>(
    input: &'a str,
    parent: Option<NodeId>,
    arena: &mut Vec<Element>,
    depth: usize,
) -> Result<&'a str, ParseError> {
    if depth >= MAX_DEPTH {
        return Err(ParseError::new(format!("nesting deeper than {}", MAX_DEPTH)));
    }

    let (mut input, (tag_name, raw_attrs, self_closing)) = start_tag(input)
        .map_err(|_| ParseError::new(format!("invalid start tag: {}", snippet(input))))?;

    let mut element = Element::new(ElementKind::from_name(tag_name));
    for (key, raw) in raw_attrs {
        element.set_attribute(key, decode_entities(raw));
    }

    let id = NodeId(arena.len());
    arena.push(element);
    if let Some(parent) = parent {
        arena[parent.0].children.push(id);
    }

    if self_closing {
        return Ok(input);
    }

    loop {
        if input.is_empty() {
            return Err(ParseError::new(format!("unclosed element <{}>", tag_name)));
        }

        if input.starts_with("</") {
            let (rest, closing) = end_tag(input)
                .map_err(|_| ParseError::new(format!("invalid end tag: {}", snippet(input))))?;
            if closing != tag_name {
                return Err(ParseError::new(format!(
                    "mismatched closing tag: expected </{}>, found </{}>",
                    tag_name, closing
                )));
            }
            return Ok(rest);
        } else if input.starts_with("<!--") {
            input = skip_past(input, "-->")?;
        } else if let Some(cdata) = input.strip_prefix("<![CDATA[") {
            let res: IResult<&str, &str> = take_until("]]>")(cdata);
            let (rest, content) =
                res.map_err(|_| ParseError::new("unterminated CDATA section"))?;
            arena[id.0].text.push_str(content);
            input = &rest[3..];
        } else if input.starts_with("<?") {
            input = skip_past(input, "?>")?;
        } else if input.starts_with('<') {
            input = parse_element(input, Some(id), arena, depth + 1)?;
        } else {
            let res: IResult<&str, &str> = take_till(|c: char| c == '<')(input);
            let (rest, text) = res.map_err(|_| ParseError::new("invalid text content"))?;
            arena[id.0].text.push_str(&decode_entities(text));
            input = rest;
        }
    }
}

/// Decode the predefined XML entities and numeric character references.
/// Unknown references are kept verbatim.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let decoded = after.find(';').and_then(|semi| {
            let entity = &after[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse::<u32>().ok().and_then(char::from_u32)
                    } else {
                        None
                    }
                }
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Say text survives a parse unchanged when it holds no markup.
        #[test]
        fn prop_say_text_roundtrip(text in "[a-zA-Z0-9 .,!?]{1,64}") {
            let input = format!("<Response><Say>{}</Say></Response>", text);
            let doc = parse_document(&input).unwrap();
            prop_assert_eq!(doc.inner_text(doc.root()), text.trim());
        }

        /// Escaped attribute values decode back to the original string.
        #[test]
        fn prop_escaped_attribute_decodes(raw in "[a-z0-9/&<>\"' ]{0,40}") {
            let escaped = raw
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;")
                .replace('\'', "&apos;");
            let input = format!("<Response><Gather action=\"{}\"/></Response>", escaped);
            let doc = parse_document(&input).unwrap();
            let gather = doc.get(doc.get(doc.root()).children[0]);
            prop_assert_eq!(gather.attribute("action"), Some(raw.as_str()));
        }

        /// The parser never panics on arbitrary input.
        #[test]
        fn prop_parse_arbitrary_input_does_not_panic(input in ".{0,200}") {
            let _ = parse_document(&input);
        }

        /// Child count matches the number of sibling elements written.
        #[test]
        fn prop_sibling_count(count in 0usize..30) {
            let mut input = String::from("<Response>");
            for i in 0..count {
                input.push_str(&format!("<Say>line {}</Say>", i));
            }
            input.push_str("</Response>");
            let doc = parse_document(&input).unwrap();
            prop_assert_eq!(doc.get(doc.root()).children.len(), count);
        }
    }
}

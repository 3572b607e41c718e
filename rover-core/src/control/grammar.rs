//! Request-line grammar for the control channel.
//!
//! Only the first line of a request is significant. It is decomposed with
//! `winnow` into a method, a path and the `key=value` pairs of the query
//! string; header lines are ignored. Values are returned still
//! percent-encoded; [`crate::control::params`] decodes the ones it parses.

use core::fmt;

use heapless::Vec;
use winnow::Parser;
use winnow::combinator::{opt, preceded};
use winnow::error::{EmptyError, ErrMode};
use winnow::token::take_while;

/// Maximum number of query pairs retained from one request. Further pairs
/// are counted in [`Request::dropped_pairs`] and otherwise ignored.
pub const MAX_QUERY_PAIRS: usize = 24;

type Parsed<O> = Result<O, ErrMode<EmptyError>>;

/// One `key=value` element of the query string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryPair<'a> {
    pub key: &'a str,
    /// Empty when the key carried no `=`.
    pub value: &'a str,
}

/// Decomposed request line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// The first [`MAX_QUERY_PAIRS`] non-empty pairs.
    pub query: Vec<QueryPair<'a>, MAX_QUERY_PAIRS>,
    /// Non-empty pairs past the cap.
    pub dropped_pairs: u8,
    raw_query: &'a str,
}

impl<'a> Request<'a> {
    /// Value of the last occurrence of `key` anywhere in the query string,
    /// including pairs past the cap.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&'a str> {
        let mut found = None;
        let mut input = self.raw_query;
        loop {
            let Ok(pair) = query_pair(&mut input) else {
                break;
            };
            if pair.key == key {
                found = Some(pair.value);
            }
            if ampersand(&mut input).is_err() {
                break;
            }
        }
        found
    }
}

/// Reasons a request line is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestError {
    Empty,
    MalformedRequestLine,
    MalformedQuery,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Empty => f.write_str("empty request"),
            RequestError::MalformedRequestLine => f.write_str("malformed request line"),
            RequestError::MalformedQuery => f.write_str("malformed query string"),
        }
    }
}

/// Returns the first line of a raw request without its terminator.
#[must_use]
pub fn request_line(raw: &str) -> &str {
    let line = raw.split('\n').next().unwrap_or("");
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parses a raw request (or just its first line).
pub fn parse_request(raw: &str) -> Result<Request<'_>, RequestError> {
    let line = request_line(raw);
    if line.trim().is_empty() {
        return Err(RequestError::Empty);
    }

    let mut input = line;
    let (method, path, query) =
        request_head(&mut input).map_err(|_| RequestError::MalformedRequestLine)?;
    if !path.starts_with('/') || !input.is_empty() {
        return Err(RequestError::MalformedRequestLine);
    }

    let raw_query = query.unwrap_or("");
    let (query, dropped_pairs) = split_query(raw_query)?;
    Ok(Request {
        method,
        path,
        query,
        dropped_pairs,
        raw_query,
    })
}

/// Splits `a=1&b=2` into pairs, skipping empty segments.
///
/// Keeps the first [`MAX_QUERY_PAIRS`] pairs and returns how many were left
/// out.
pub fn split_query(
    query: &str,
) -> Result<(Vec<QueryPair<'_>, MAX_QUERY_PAIRS>, u8), RequestError> {
    let mut pairs = Vec::new();
    let mut dropped: u8 = 0;
    let mut input = query;
    loop {
        let pair = query_pair(&mut input).map_err(|_| RequestError::MalformedQuery)?;
        if !pair.key.is_empty() && pairs.push(pair).is_err() {
            dropped = dropped.saturating_add(1);
        }
        if ampersand(&mut input).is_err() {
            break;
        }
    }
    if input.is_empty() {
        Ok((pairs, dropped))
    } else {
        Err(RequestError::MalformedQuery)
    }
}

fn request_head<'a>(input: &mut &'a str) -> Parsed<(&'a str, &'a str, Option<&'a str>)> {
    let method = method(input)?;
    blank(input)?;
    let path = path(input)?;
    let query = opt(query).parse_next(input)?;
    opt(preceded(blank, version)).parse_next(input)?;
    trailing(input)?;
    Ok((method, path, query))
}

fn method<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    take_while(1.., |c: char| c.is_ascii_uppercase()).parse_next(input)
}

fn blank<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    take_while(1.., [' ', '\t']).parse_next(input)
}

fn trailing<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    take_while(0.., [' ', '\t']).parse_next(input)
}

fn path<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    take_while(1.., |c: char| c.is_ascii_graphic() && c != '?').parse_next(input)
}

fn query<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    preceded('?', take_while(0.., |c: char| c.is_ascii_graphic())).parse_next(input)
}

fn version<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    take_while(1.., |c: char| c.is_ascii_graphic()).parse_next(input)
}

fn query_key<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    take_while(0.., |c: char| c != '&' && c != '=').parse_next(input)
}

fn query_value<'a>(input: &mut &'a str) -> Parsed<&'a str> {
    preceded('=', take_while(0.., |c: char| c != '&')).parse_next(input)
}

fn ampersand(input: &mut &str) -> Parsed<char> {
    '&'.parse_next(input)
}

fn query_pair<'a>(input: &mut &'a str) -> Parsed<QueryPair<'a>> {
    let key = query_key(input)?;
    let value = opt(query_value).parse_next(input)?;
    Ok(QueryPair {
        key,
        value: value.unwrap_or(""),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_with_overrides() {
        let request =
            parse_request("GET /?action=start&speed=40&first_side=right HTTP/1.1\r\nHost: rover\r\n\r\n")
                .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/");
        assert_eq!(request.query_value("action"), Some("start"));
        assert_eq!(request.query_value("speed"), Some("40"));
        assert_eq!(request.query_value("first_side"), Some("right"));
        assert_eq!(request.query.len(), 3);
    }

    #[test]
    fn parses_plain_path_without_version() {
        let request = parse_request("GET /sensors").unwrap();
        assert_eq!(request.path, "/sensors");
        assert!(request.query.is_empty());
    }

    #[test]
    fn last_repeated_key_wins_and_empty_segments_skip() {
        let request = parse_request("GET /?speed=10&&speed=20&grace= HTTP/1.1").unwrap();
        assert_eq!(request.query_value("speed"), Some("20"));
        assert_eq!(request.query_value("grace"), Some(""));
        assert_eq!(request.query.len(), 3);
    }

    #[test]
    fn bare_keys_have_empty_values() {
        let (pairs, dropped) = split_query("action=update&verbose").unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(pairs[1], QueryPair { key: "verbose", value: "" });
    }

    #[test]
    fn rejects_garbage_request_lines() {
        assert_eq!(parse_request(""), Err(RequestError::Empty));
        assert_eq!(
            parse_request("get / HTTP/1.1"),
            Err(RequestError::MalformedRequestLine)
        );
        assert_eq!(
            parse_request("GET sensors HTTP/1.1"),
            Err(RequestError::MalformedRequestLine)
        );
        assert_eq!(
            parse_request("GET / HTTP/1.1 extra"),
            Err(RequestError::MalformedRequestLine)
        );
    }

    #[test]
    fn pairs_past_the_cap_are_counted_not_rejected() {
        let mut line: heapless::String<512> = heapless::String::new();
        line.push_str("GET /?").unwrap();
        for _ in 0..MAX_QUERY_PAIRS + 3 {
            line.push_str("k=1&").unwrap();
        }
        line.push_str("action=stop HTTP/1.1").unwrap();

        let request = parse_request(&line).unwrap();
        assert_eq!(request.query.len(), MAX_QUERY_PAIRS);
        assert_eq!(request.dropped_pairs, 4);
        assert_eq!(request.query_value("action"), Some("stop"));
    }
}

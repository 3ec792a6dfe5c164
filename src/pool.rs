//! Thread-local parser pooling.
//!
//! Keeps one [`LanguageParser`] per language per thread. The first call for a
//! language creates it; later calls reuse it, avoiding grammar setup on every
//! file in batch validation.

use crate::ts::errors::TreeSitterError;
use crate::ts::language::SupportLang;
use crate::ts::parser::{LanguageParser, ParserBackend};
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

thread_local! {
    static PARSERS: RefCell<HashMap<SupportLang, LanguageParser>> = RefCell::new(HashMap::new());
}

/// Run `f` with this thread's pooled parser for `language`.
///
/// The parser is reset before it is handed out, so no state leaks between
/// callers. Not reentrant: `f` must not call `with_parser` itself.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use treekeep::pool::with_parser;
/// use treekeep::SupportLang;
///
/// let tree = with_parser(SupportLang::Python, |parser| parser.parse_str("x = 1\n"))??;
/// assert!(!tree.has_error());
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(language: SupportLang, f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut LanguageParser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(language) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(LanguageParser::new(language)?),
        };
        parser.reset();
        Ok(f(parser))
    })
}

/// Number of languages with a pooled parser on this thread.
pub fn pooled_languages() -> usize {
    PARSERS.with(|cell| cell.borrow().len())
}

//! Read-only sign tables.
//!
//! The engine itself never interprets sign names; these tables are used by
//! the glyph provider layer to turn Gardiner codes and transliteration
//! mnemonics into font codepoints. They cover the signs common in running
//! text; unknown names fall back to a placeholder so that layout never
//! observes a resolution failure.

/// Codepoint substituted for unresolvable sign names.
pub const PLACEHOLDER: char = '\u{13000}';

/// Gardiner codes mapped to codepoints of the Egyptian Hieroglyphs block.
static SIGNS: &[(&str, char)] = &[
    ("A1", '\u{13000}'),
    ("A2", '\u{13001}'),
    ("A3", '\u{13002}'),
    ("A4", '\u{13003}'),
    ("A5", '\u{13004}'),
    ("A6", '\u{13005}'),
    ("A7", '\u{13006}'),
    ("A8", '\u{13007}'),
    ("A9", '\u{13008}'),
    ("A10", '\u{13009}'),
    ("A11", '\u{1300A}'),
    ("A12", '\u{1300B}'),
    ("A13", '\u{1300C}'),
    ("A14", '\u{1300D}'),
    ("B1", '\u{13050}'),
    ("D21", '\u{1308B}'),
    ("D36", '\u{1309D}'),
    ("D58", '\u{130C0}'),
    ("G1", '\u{1313F}'),
    ("G17", '\u{13153}'),
    ("G43", '\u{13171}'),
    ("M17", '\u{131CB}'),
    ("N5", '\u{131F3}'),
    ("N35", '\u{13216}'),
    ("O1", '\u{13250}'),
    ("O34", '\u{13283}'),
    ("Q3", '\u{132AA}'),
    ("S29", '\u{13309}'),
    ("V31", '\u{133A1}'),
    ("X1", '\u{133CF}'),
    ("Z1", '\u{133E4}'),
];

/// Transliteration mnemonics mapped to the Gardiner code they stand for.
static MNEMONICS: &[(&str, &str)] = &[
    ("A", "G1"),
    ("b", "D58"),
    ("i", "M17"),
    ("k", "V31"),
    ("m", "G17"),
    ("n", "N35"),
    ("p", "Q3"),
    ("pr", "O1"),
    ("r", "D21"),
    ("ra", "N5"),
    ("s", "O34"),
    ("t", "X1"),
    ("w", "G43"),
];

/// Resolves a sign name or mnemonic to its Gardiner code.
pub fn canonical(name: &str) -> &str {
    match MNEMONICS.iter().find(|(m, _)| *m == name) {
        Some((_, code)) => code,
        None => name,
    }
}

/// Looks up the codepoint for a sign name or mnemonic.
pub fn lookup(name: &str) -> Option<char> {
    let code = canonical(name);
    SIGNS.iter().find(|(n, _)| *n == code).map(|(_, c)| *c)
}

/// Looks up a sign, substituting the placeholder for unknown names.
pub fn glyph_for(name: &str) -> char {
    match lookup(name) {
        Some(c) => c,
        None => {
            debug!("unknown sign name {:?}, substituting placeholder", name);
            PLACEHOLDER
        }
    }
}

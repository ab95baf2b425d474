//! Character tables used by the normalizer

/// Emoji, pictograph and symbol blocks that are replaced by a space.
const SYMBOL_RANGES: &[(u32, u32)] = &[
    // General punctuation, super/subscripts, currency, combining marks for symbols
    (0x2000, 0x20FF),
    // Letterlike symbols, number forms, arrows
    (0x2100, 0x21FF),
    // Mathematical operators, misc technical, control pictures, OCR
    (0x2200, 0x245F),
    // Enclosed alphanumerics, box drawing, block elements, geometric shapes
    (0x2460, 0x25FF),
    // Miscellaneous symbols and dingbats
    (0x2600, 0x27BF),
    // CJK symbols and punctuation
    (0x3000, 0x303F),
    // Enclosed CJK letters and months, CJK compatibility
    (0x3200, 0x33FF),
    // Variation selectors
    (0xFE00, 0xFE0F),
    // Combining half marks
    (0xFE20, 0xFE2F),
    // Mahjong tiles through playing cards
    (0x1F000, 0x1F0FF),
    // Enclosed alphanumeric supplement and regional indicators (flags)
    (0x1F100, 0x1F1FF),
    // Enclosed ideographic supplement
    (0x1F200, 0x1F2FF),
    // Pictographs, emoticons, transport and map symbols
    (0x1F300, 0x1F6FF),
    // Alchemical symbols, geometric shapes extended, supplemental arrows-C
    (0x1F700, 0x1F8FF),
    // Supplemental symbols and pictographs, chess, pictographs extended-A
    (0x1F900, 0x1FAFF),
];

/// Typographic, currency, math and abbreviation substitutions, applied in
/// this order at each text position.
pub(crate) const SUBSTITUTIONS: &[(&str, &str)] = &[
    // Quotes and dashes
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{201E}", "\""),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("`", "'"),
    ("\u{B4}", "'"),
    ("\u{2013}", "-"),
    ("\u{2014}", " - "),
    ("\u{2026}", "..."),
    // Marks and currency
    ("\u{AE}", " registered trademark "),
    ("\u{2122}", " trademark "),
    ("\u{A9}", " copyright "),
    ("\u{B0}", " degrees "),
    ("\u{20AC}", " euros "),
    ("\u{A3}", " pounds "),
    ("\u{A5}", " yen "),
    ("$", " dollars "),
    ("&", " and "),
    ("@", " at "),
    ("#", " number "),
    ("%", " percent "),
    // Mathematical symbols
    ("\u{D7}", " times "),
    ("\u{F7}", " divided by "),
    ("\u{B1}", " plus or minus "),
    ("\u{B2}", " squared "),
    ("\u{B3}", " cubed "),
    ("\u{BD}", " one half "),
    ("\u{BC}", " one quarter "),
    ("\u{BE}", " three quarters "),
    // Abbreviations
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("etc.", "etcetera"),
    ("vs.", "versus"),
    ("Mrs.", "Missus"),
    ("Mr.", "Mister"),
    ("Ms.", "Miss"),
    ("Dr.", "Doctor"),
    ("Prof.", "Professor"),
    ("Inc.", "Incorporated"),
    ("Ltd.", "Limited"),
    ("Corp.", "Corporation"),
    ("Co.", "Company"),
    // Tech acronyms
    ("URL", "U R L"),
    ("HTTP", "H T T P"),
    ("HTML", "H T M L"),
    ("CSS", "C S S"),
    ("JS", "JavaScript"),
    ("API", "A P I"),
    ("UI", "U I"),
    ("UX", "U X"),
];

/// True for characters the substitution table spells out.
fn has_substitution(c: char) -> bool {
    let mut buf = [0u8; 4];
    let key: &str = c.encode_utf8(&mut buf);
    SUBSTITUTIONS.iter().any(|(from, _)| *from == key)
}

/// True for emoji and pictographic symbols that should be dropped.
///
/// Characters with a spoken substitution (curly quotes, the euro sign,
/// the trademark sign) fall inside these blocks but are left for the
/// substitution step.
pub(crate) fn is_removable_symbol(c: char) -> bool {
    let code = c as u32;
    if matches!(code, 0x200D | 0x20E3 | 0xFE0F) {
        return true;
    }
    SYMBOL_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
        && !has_substitution(c)
}

/// Format and private-use characters that count as control characters
/// alongside `char::is_control`.
pub(crate) fn is_format_or_private(c: char) -> bool {
    matches!(
        c as u32,
        0x00AD
            | 0x061C
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0xE000..=0xF8FF
            | 0xF0000..=0x10FFFF
    )
}

/// Characters the synthesizer is guaranteed to accept.
pub(crate) fn is_synthesis_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            ' ' | '\t'
                | '.'
                | ','
                | '!'
                | '?'
                | ';'
                | ':'
                | '-'
                | '('
                | ')'
                | '['
                | ']'
                | '"'
                | '\''
        )
}

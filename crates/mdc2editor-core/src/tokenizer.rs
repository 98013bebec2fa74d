//! Splits plain text into literal text and emoji glyph segments.
//!
//! Text is walked one extended grapheme cluster at a time, so a glyph is always
//! a whole user-perceived character: ZWJ sequences, flags, keycaps, skin-tone
//! and tag sequences come out in one piece. A cluster counts as emoji when its
//! base renders as emoji, either by default or through VS16.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Emoji(&'a str),
}

const VS15: char = '\u{FE0E}';
const VS16: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

pub fn tokenize(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;

    for (start, cluster) in input.grapheme_indices(true) {
        if !is_emoji(cluster) {
            continue;
        }
        if text_start < start {
            segments.push(Segment::Text(&input[text_start..start]));
        }
        segments.push(Segment::Emoji(cluster));
        text_start = start + cluster.len();
    }

    if text_start < input.len() {
        segments.push(Segment::Text(&input[text_start..]));
    }
    segments
}

fn is_emoji(cluster: &str) -> bool {
    let mut chars = cluster.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    if is_regional_indicator(first) {
        return chars.next().is_some_and(is_regional_indicator);
    }
    if is_keycap_base(first) {
        return cluster.ends_with(KEYCAP);
    }
    if cluster.contains(VS15) {
        return false;
    }
    is_emoji_presentation(first) || (is_text_default_pictograph(first) && cluster.contains(VS16))
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_keycap_base(c: char) -> bool {
    c.is_ascii_digit() || c == '#' || c == '*'
}

/// Characters rendered as emoji without a variation selector.
fn is_emoji_presentation(c: char) -> bool {
    matches!(c as u32,
        0x231A..=0x231B
        | 0x23E9..=0x23EC
        | 0x23F0
        | 0x23F3
        | 0x25FD..=0x25FE
        | 0x2614..=0x2615
        | 0x2648..=0x2653
        | 0x267F
        | 0x2693
        | 0x26A1
        | 0x26AA..=0x26AB
        | 0x26BD..=0x26BE
        | 0x26C4..=0x26C5
        | 0x26CE
        | 0x26D4
        | 0x26EA
        | 0x26F2..=0x26F3
        | 0x26F5
        | 0x26FA
        | 0x26FD
        | 0x2705
        | 0x270A..=0x270B
        | 0x2728
        | 0x274C
        | 0x274E
        | 0x2753..=0x2755
        | 0x2757
        | 0x2795..=0x2797
        | 0x27B0
        | 0x27BF
        | 0x2B1B..=0x2B1C
        | 0x2B50
        | 0x2B55
        | 0x1F004
        | 0x1F0CF
        | 0x1F18E
        | 0x1F191..=0x1F19A
        | 0x1F201
        | 0x1F21A
        | 0x1F22F
        | 0x1F232..=0x1F236
        | 0x1F238..=0x1F23A
        | 0x1F250..=0x1F251
        | 0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F7E0..=0x1F7EB
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF
    )
}

/// Pictographs that default to text presentation and only become emoji when
/// followed by VS16 (`❤️`, `✔️`, `©️`).
fn is_text_default_pictograph(c: char) -> bool {
    matches!(c as u32,
        0x00A9
        | 0x00AE
        | 0x203C
        | 0x2049
        | 0x2122
        | 0x2139
        | 0x2194..=0x2199
        | 0x21A9..=0x21AA
        | 0x2328
        | 0x23CF
        | 0x23ED..=0x23EF
        | 0x23F1..=0x23F2
        | 0x23F8..=0x23FA
        | 0x24C2
        | 0x25AA..=0x25AB
        | 0x25B6
        | 0x25C0
        | 0x25FB..=0x25FC
        | 0x2600..=0x27BF
        | 0x2934..=0x2935
        | 0x2B05..=0x2B07
        | 0x3030
        | 0x303D
        | 0x3297
        | 0x3299
    )
}

//! GECOS transliteration to ISO 646-60.
//!
//! ISO 646-60 is the Norwegian 7-bit national variant: the code points of
//! `[ \ ] { | }` carry `Æ Ø Å æ ø å`. Legacy NIS clients render GECOS in that
//! charset, so other Latin letters fold to their base letter and anything
//! left outside printable ASCII becomes `?`.

/// Transliterate `text` into the 7-bit ISO 646-60 repertoire.
pub fn to_iso646_60(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            'Æ' => out.push('['),
            'Ø' => out.push('\\'),
            'Å' => out.push(']'),
            'æ' => out.push('{'),
            'ø' => out.push('|'),
            'å' => out.push('}'),
            'ß' => out.push_str("ss"),
            'Œ' => out.push_str("OE"),
            'œ' => out.push_str("oe"),
            '\t' => out.push(' '),
            _ => out.push(fold_latin(c).unwrap_or('?')),
        }
    }
    out
}

/// Base letter of an accented Latin-1 / Latin Extended-A letter.
fn fold_latin(c: char) -> Option<char> {
    let base = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'ā' | 'ă' | 'ą' => 'a',
        'Ç' | 'Ć' | 'Č' => 'C',
        'ç' | 'ć' | 'č' => 'c',
        'Ð' | 'Ď' | 'Đ' => 'D',
        'ð' | 'ď' | 'đ' => 'd',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'Ğ' => 'G',
        'ğ' => 'g',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'İ' => 'I',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => 'i',
        'Ł' | 'Ľ' => 'L',
        'ł' | 'ľ' => 'l',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ō' | 'Ő' => 'O',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' | 'ő' => 'o',
        'Ř' => 'R',
        'ř' => 'r',
        'Ś' | 'Š' | 'Ş' => 'S',
        'ś' | 'š' | 'ş' => 's',
        'Ť' | 'Ţ' => 'T',
        'ť' | 'ţ' => 't',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' => 'U',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'Ý' | 'Ÿ' => 'Y',
        'ý' | 'ÿ' => 'y',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        'ź' | 'ż' | 'ž' => 'z',
        'Þ' => 'T',
        'þ' => 't',
        _ => return None,
    };
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norwegian_letters() {
        assert_eq!(to_iso646_60("Bjørn Ærlig Åsen"), "Bj|rn [rlig ]sen");
        assert_eq!(to_iso646_60("blåbærsyltetøy"), "bl}b{rsyltet|y");
    }

    #[test]
    fn test_accents_fold_to_base() {
        assert_eq!(to_iso646_60("José Müller"), "Jose Muller");
        assert_eq!(to_iso646_60("Łukasz Straße"), "Lukasz Strasse");
    }

    #[test]
    fn test_unknown_becomes_question_mark() {
        assert_eq!(to_iso646_60("李 Li"), "? Li");
    }

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(to_iso646_60("Jane Doe (room 101)"), "Jane Doe (room 101)");
    }
}

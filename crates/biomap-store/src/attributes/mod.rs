//! Attribute stores joined to polygons by external code, then by name.

pub mod csv;
pub mod memory;

pub use self::csv::CsvAttributeStore;
pub use self::memory::MemoryAttributeStore;

/// Join key for names: trimmed, lowercase, accents folded, single spaces.
///
/// `"  São  José dos Campos"` and `"SAO JOSE DOS CAMPOS"` normalize alike.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| word.chars().flat_map(char::to_lowercase).map(fold_accent).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

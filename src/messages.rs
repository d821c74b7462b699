use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LengthHint;

/// Language of the suggestion catalogue. Scores never depend on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    pub fn messages(self) -> &'static Messages {
        match self {
            Language::En => &ENGLISH,
            Language::Es => &SPANISH,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::En => write!(f, "en"),
            Language::Es => write!(f, "es"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "es" | "spanish" | "español" => Ok(Language::Es),
            other => Err(format!("unsupported language '{other}' (expected en or es)")),
        }
    }
}

#[derive(Debug)]
pub struct Messages {
    pub empty_prompt: &'static str,
    pub length_missing: &'static str,
    pub length_short: &'static str,
    pub length_long: &'static str,
    pub split_sentences: &'static str,
    pub describe_style: &'static str,
    pub camera_terms: &'static str,
}

impl Messages {
    pub fn length_hint(&self, hint: LengthHint) -> &'static str {
        match hint {
            LengthHint::Missing => self.length_missing,
            LengthHint::TooShort => self.length_short,
            LengthHint::TooLong => self.length_long,
        }
    }
}

static ENGLISH: Messages = Messages {
    empty_prompt: "Provide a prompt with specific detail to generate an analysis.",
    length_missing: "Add detail to the prompt to get a useful analysis.",
    length_short: "Expand the prompt with context, style and relevant visual detail.",
    length_long: "Reduce redundancy and focus the prompt on its key elements.",
    split_sentences: "Split the prompt into separate sentences to highlight visual elements and style.",
    describe_style:
        "Describe style, lighting, color palette or composition to better guide the model.",
    camera_terms: "Include camera or render terminology if you want a more precise photographic or 3D result.",
};

static SPANISH: Messages = Messages {
    empty_prompt: "Proporciona un prompt con detalles específicos para generar un análisis.",
    length_missing: "Añade detalles al prompt para obtener un análisis útil.",
    length_short: "Amplía el prompt con contexto, estilo y detalles visuales relevantes.",
    length_long: "Reduce redundancias y centra el prompt en los elementos clave.",
    split_sentences: "Divide el prompt en frases separadas para destacar elementos visuales y estilo.",
    describe_style:
        "Describe estilo, iluminación, paleta de color o composición para orientar mejor al modelo.",
    camera_terms: "Incluye terminología de cámara o render si buscas un resultado fotográfico o 3D más preciso.",
};

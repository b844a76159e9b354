use std::{fmt, str::FromStr, time::Instant};

use serde::{Deserialize, Serialize};

/// One decoded RGBA frame as produced by a frame source.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0 || self.rgba.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// +1 for left, -1 for right. Matches the sign convention of head yaw.
    pub fn yaw_sign(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn label(self, lang: Language) -> &'static str {
        match (self, lang) {
            (Side::Left, Language::En) => "Left",
            (Side::Right, Language::En) => "Right",
            (Side::Left, Language::Zh) => "左",
            (Side::Right, Language::Zh) => "右",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Side::Left),
            "right" | "r" => Ok(Side::Right),
            other => Err(format!("unknown side `{other}` (expected left or right)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanalType {
    Posterior,
    Horizontal,
    Anterior,
}

impl CanalType {
    pub fn label(self, lang: Language) -> &'static str {
        match (self, lang) {
            (CanalType::Posterior, Language::En) => "Posterior",
            (CanalType::Horizontal, Language::En) => "Horizontal",
            (CanalType::Anterior, Language::En) => "Anterior",
            (CanalType::Posterior, Language::Zh) => "后半规管",
            (CanalType::Horizontal, Language::Zh) => "水平半规管",
            (CanalType::Anterior, Language::Zh) => "前半规管",
        }
    }
}

/// The side the user declared before the provocation test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TestSide {
    Left,
    Right,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl TestSide {
    pub fn side(self) -> Option<Side> {
        match self {
            TestSide::Left => Some(Side::Left),
            TestSide::Right => Some(Side::Right),
            TestSide::Unknown => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            TestSide::Left => "Left",
            TestSide::Right => "Right",
            TestSide::Unknown => "UNKNOWN",
        }
    }
}

impl From<Side> for TestSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => TestSide::Left,
            Side::Right => TestSide::Right,
        }
    }
}

impl FromStr for TestSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unknown") {
            return Ok(TestSide::Unknown);
        }
        s.parse::<Side>().map(TestSide::from)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "zh" | "cn" | "chinese" => Ok(Language::Zh),
            other => Err(format!("unsupported language `{other}` (expected en or zh)")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of one classification round trip. Never mutated after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosisResult {
    pub has_bppv: bool,
    pub side: Option<Side>,
    pub canal: Option<CanalType>,
    pub confidence: f32,
    pub reasoning: String,
}

impl DiagnosisResult {
    pub fn negative(reasoning: impl Into<String>) -> Self {
        Self {
            has_bppv: false,
            side: None,
            canal: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }

    pub fn display_text(&self, lang: Language) -> String {
        if !self.has_bppv {
            return match lang {
                Language::En => format!("No BPPV pattern detected ({:.0}%)", self.confidence * 100.0),
                Language::Zh => format!("未检测到耳石症特征 ({:.0}%)", self.confidence * 100.0),
            };
        }

        let side = self.side.map(|s| s.label(lang)).unwrap_or("?");
        let canal = self.canal.map(|c| c.label(lang)).unwrap_or("?");
        match lang {
            Language::En => format!(
                "BPPV suspected: {side} {canal} canal ({:.0}%)",
                self.confidence * 100.0
            ),
            Language::Zh => format!(
                "疑似耳石症：{side}侧 {canal} ({:.0}%)",
                self.confidence * 100.0
            ),
        }
    }
}

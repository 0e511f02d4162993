// Core data models for the Emotion Overlay application

/// Static display data for one supported emotion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmotionDescriptor {
    /// Canonical display name
    pub name: &'static str,
    /// Emoji glyph shown in the indicator and legend
    pub emoji: &'static str,
    /// Indicator background color (RGB)
    pub color: [u8; 3],
}

/// The fixed set of emotions the overlay knows how to display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Neutral,
}

static DESCRIPTORS: [EmotionDescriptor; 7] = [
    EmotionDescriptor {
        name: "Happy",
        emoji: "😊",
        color: [0xFE, 0xF9, 0xC3],
    },
    EmotionDescriptor {
        name: "Sad",
        emoji: "😢",
        color: [0xDB, 0xEA, 0xFE],
    },
    EmotionDescriptor {
        name: "Angry",
        emoji: "😠",
        color: [0xFE, 0xE2, 0xE2],
    },
    EmotionDescriptor {
        name: "Surprised",
        emoji: "😲",
        color: [0xF3, 0xE8, 0xFF],
    },
    EmotionDescriptor {
        name: "Fearful",
        emoji: "😨",
        color: [0xE0, 0xE7, 0xFF],
    },
    EmotionDescriptor {
        name: "Disgusted",
        emoji: "🤢",
        color: [0xDC, 0xFC, 0xE7],
    },
    EmotionDescriptor {
        name: "Neutral",
        emoji: "😐",
        color: [0xF3, 0xF4, 0xF6],
    },
];

impl Emotion {
    /// All emotions in legend order
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Neutral,
    ];

    /// Returns the static descriptor for this emotion
    pub fn descriptor(self) -> &'static EmotionDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn emoji(self) -> &'static str {
        self.descriptor().emoji
    }

    /// Case-insensitive lookup by name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|emotion| emotion.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detected region in canvas pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive bottom-right corner
    pub fn max(&self) -> (f64, f64) {
        (self.x + self.width, self.y + self.height)
    }
}

/// First result of one poll, as reported by the endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Emotion name exactly as the endpoint spelled it
    pub emotion: String,
    /// Optional glyph supplied by the endpoint
    pub emoji: Option<String>,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Resolves the reported name against the fixed emotion table
    pub fn matched_emotion(&self) -> Option<Emotion> {
        Emotion::from_name(&self.emotion)
    }
}

use bitflags::bitflags;

bitflags! {
    /// Behavior switches for parsing and rendering. `COMPATIBILITY` strips
    /// the dialect down to core Markdown; the others toggle individual
    /// features on top of the default set.
    #[repr(transparent)]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Extensions: u32 {
        const COMPATIBILITY = 1;
        const COMPLETE = 1 << 1;
        const SNIPPET = 1 << 2;
        const SMART = 1 << 3;
        const NOTES = 1 << 4;
        const NO_LABELS = 1 << 5;
        const PROCESS_HTML = 1 << 6;
        const NO_METADATA = 1 << 7;
        const OBFUSCATE = 1 << 8;
        const CRITIC = 1 << 9;
        const CRITIC_ACCEPT = 1 << 10;
        const CRITIC_REJECT = 1 << 11;
        const RANDOM_FOOT = 1 << 12;
        const TRANSCLUDE = 1 << 13;
        const PARSE_OPML = 1 << 14;
        const PARSE_ITMZ = 1 << 15;
        const RANDOM_LABELS = 1 << 16;
    }
}

impl Extensions {
    /// The default feature set for MultiMarkdown processing: the full
    /// dialect with smart typography and notes enabled.
    pub fn standard() -> Self {
        Extensions::SMART | Extensions::NOTES | Extensions::CRITIC
    }

    /// True unless compatibility mode turned the dialect extensions off.
    pub fn mmd_features(self) -> bool {
        !self.contains(Extensions::COMPATIBILITY)
    }

    pub fn smart(self) -> bool {
        self.contains(Extensions::SMART) && self.mmd_features()
    }

    pub fn notes(self) -> bool {
        self.contains(Extensions::NOTES) && self.mmd_features()
    }

    pub fn critic(self) -> bool {
        self.contains(Extensions::CRITIC) && self.mmd_features()
    }
}

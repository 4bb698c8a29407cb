use bitflags::bitflags;

bitflags! {
    /// Per-path status; an empty set means the path is current everywhere
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct StatusFlags: u16 {
        const INDEX_NEW = 1 << 0;
        const INDEX_MODIFIED = 1 << 1;
        const INDEX_DELETED = 1 << 2;
        const INDEX_TYPECHANGE = 1 << 3;

        const WT_NEW = 1 << 4;
        const WT_MODIFIED = 1 << 5;
        const WT_DELETED = 1 << 6;
        const WT_TYPECHANGE = 1 << 7;
        /// The file exists but could not be stat'ed or read
        const WT_UNREADABLE = 1 << 8;

        const IGNORED = 1 << 9;
        const CONFLICTED = 1 << 10;

        const INDEX_CHANGES = Self::INDEX_NEW.bits()
            | Self::INDEX_MODIFIED.bits()
            | Self::INDEX_DELETED.bits()
            | Self::INDEX_TYPECHANGE.bits();
        const WT_CHANGES = Self::WT_NEW.bits()
            | Self::WT_MODIFIED.bits()
            | Self::WT_DELETED.bits()
            | Self::WT_TYPECHANGE.bits()
            | Self::WT_UNREADABLE.bits();
    }
}

impl StatusFlags {
    pub fn is_current(&self) -> bool {
        self.is_empty()
    }

    pub fn is_index_change(&self) -> bool {
        self.intersects(Self::INDEX_CHANGES)
    }

    pub fn is_worktree_change(&self) -> bool {
        self.intersects(Self::WT_CHANGES)
    }

    /// Two-column code as in `git status --short`
    pub fn short_format(&self) -> String {
        if self.contains(Self::CONFLICTED) {
            return "UU".to_string();
        }
        if self.contains(Self::IGNORED) {
            return "!!".to_string();
        }
        if self.contains(Self::WT_NEW) {
            return "??".to_string();
        }

        let index = if self.contains(Self::INDEX_NEW) {
            'A'
        } else if self.contains(Self::INDEX_DELETED) {
            'D'
        } else if self.contains(Self::INDEX_TYPECHANGE) {
            'T'
        } else if self.contains(Self::INDEX_MODIFIED) {
            'M'
        } else {
            ' '
        };
        let worktree = if self.contains(Self::WT_DELETED) {
            'D'
        } else if self.contains(Self::WT_TYPECHANGE) {
            'T'
        } else if self.intersects(Self::WT_MODIFIED | Self::WT_UNREADABLE) {
            'M'
        } else {
            ' '
        };
        format!("{index}{worktree}")
    }
}

impl std::fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_format())
    }
}

use bitflags::bitflags;

bitflags! {
    /// Host operations a work node needs at commit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        const PLACEMENT = 0b0000_0001;
        const UPDATE = 0b0000_0010;
        const CHILD_DELETION = 0b0000_0100;
        /// The component registered passive effects that must run this commit.
        const PASSIVE_EFFECT = 0b0000_1000;
        const REF = 0b0001_0000;

        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits()
            | Self::REF.bits();
        /// Deletions are included since deleted components tear their effects down.
        const PASSIVE_MASK = Self::PASSIVE_EFFECT.bits() | Self::CHILD_DELETION.bits();
        const COMMIT_MASK = Self::MUTATION_MASK.bits() | Self::PASSIVE_MASK.bits();
    }
}

bitflags! {
    /// Per-effect tags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u8 {
        /// Dependencies changed; setup must run after this commit.
        const HAS_EFFECT = 0b0001;
        const PASSIVE = 0b0010;
    }
}

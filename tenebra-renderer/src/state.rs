//! Fixed-function state carried by every draw.
//!
//! A [`PipelineState`] is applied atomically with the draw it belongs to, so no pass relies on
//! state left behind by an earlier one.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Back,
    Front,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Source overwrites destination.
    Replace,
    /// `ONE + ONE`
    Additive,
    /// `SRC_ALPHA + ONE_MINUS_SRC_ALPHA`
    Alpha,
}

impl BlendMode {
    /// Blends `src` over `dst`, clamping to the unorm range.
    pub fn apply(self, src: glam::Vec4, dst: glam::Vec4) -> glam::Vec4 {
        let blended = match self {
            Self::Replace => src,
            Self::Additive => src + dst,
            Self::Alpha => {
                let a = src.w;
                (src.truncate() * a + dst.truncate() * (1.0 - a)).extend(a + dst.w * (1.0 - a))
            }
        };
        blended.clamp(glam::Vec4::ZERO, glam::Vec4::ONE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    /// Evaluates `incoming <op> stored`.
    pub fn passes<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => incoming < stored,
            Self::Equal => incoming == stored,
            Self::LessEqual => incoming <= stored,
            Self::Greater => incoming > stored,
            Self::NotEqual => incoming != stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Always => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

impl StencilOperation {
    pub fn apply(self, value: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => value,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::Invert => !value,
            Self::IncrementClamp => value.saturating_add(1),
            Self::DecrementClamp => value.saturating_sub(1),
            Self::IncrementWrap => value.wrapping_add(1),
            Self::DecrementWrap => value.wrapping_sub(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

impl StencilFaceState {
    pub const fn new(
        compare: CompareFunction,
        fail: StencilOperation,
        depth_fail: StencilOperation,
        pass: StencilOperation,
    ) -> Self {
        Self {
            compare,
            fail,
            depth_fail,
            pass,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub front: StencilFaceState,
    pub back: StencilFaceState,
    pub reference: u8,
    pub read_mask: u8,
    pub write_mask: u8,
}

impl StencilState {
    /// Same test and ops on both faces, full masks.
    pub const fn both(face: StencilFaceState, reference: u8) -> Self {
        Self {
            front: face,
            back: face,
            reference,
            read_mask: 0xFF,
            write_mask: 0xFF,
        }
    }

    pub fn face(&self, front_facing: bool) -> &StencilFaceState {
        if front_facing {
            &self.front
        } else {
            &self.back
        }
    }

    pub fn test(&self, front_facing: bool, stored: u8) -> bool {
        self.face(front_facing).compare.passes(
            self.reference & self.read_mask,
            stored & self.read_mask,
        )
    }

    /// Applies `op` to `stored`, honouring the write mask.
    pub fn update(&self, op: StencilOperation, stored: u8) -> u8 {
        let value = op.apply(stored, self.reference);
        (stored & !self.write_mask) | (value & self.write_mask)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// `None` disables the depth test entirely.
    pub compare: Option<CompareFunction>,
    pub write: bool,
    /// Clamp fragment depth to the depth range instead of clipping against the far plane.
    pub clamp: bool,
}

impl DepthState {
    pub const DISABLED: Self = Self {
        compare: None,
        write: false,
        clamp: false,
    };

    pub const LESS_EQUAL: Self = Self {
        compare: Some(CompareFunction::LessEqual),
        write: true,
        clamp: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub cull: CullMode,
    pub blend: BlendMode,
    pub depth: DepthState,
    pub stencil: Option<StencilState>,
    pub color_writes: bool,
}

impl PipelineState {
    /// The state every frame returns to once lighting is done: stencil off, depth test and
    /// writes on with `LEQUAL`, back faces culled, standard alpha blending.
    pub const DEFAULT: Self = Self {
        cull: CullMode::Back,
        blend: BlendMode::Alpha,
        depth: DepthState::LESS_EQUAL,
        stencil: None,
        color_writes: true,
    };

    pub const fn with_blend(self, blend: BlendMode) -> Self {
        Self { blend, ..self }
    }

    pub const fn with_cull(self, cull: CullMode) -> Self {
        Self { cull, ..self }
    }

    pub fn culls(&self, front_facing: bool) -> bool {
        match self.cull {
            CullMode::None => false,
            CullMode::Back => !front_facing,
            CullMode::Front => front_facing,
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_ops_wrap() {
        assert_eq!(StencilOperation::DecrementWrap.apply(0, 0), 255);
        assert_eq!(StencilOperation::IncrementWrap.apply(255, 0), 0);
        assert_eq!(StencilOperation::DecrementClamp.apply(0, 0), 0);
        assert_eq!(StencilOperation::Replace.apply(7, 1), 1);
    }

    #[test]
    fn write_mask_preserves_masked_bits() {
        let state = StencilState {
            write_mask: 0x0F,
            ..StencilState::both(
                StencilFaceState::new(
                    CompareFunction::Always,
                    StencilOperation::Keep,
                    StencilOperation::Keep,
                    StencilOperation::Replace,
                ),
                0xFF,
            )
        };

        assert_eq!(state.update(StencilOperation::Replace, 0xA0), 0xAF);
    }

    #[test]
    fn blending_clamps() {
        let dst = glam::Vec4::new(0.5, 0.5, 0.5, 1.0);

        assert_eq!(
            BlendMode::Additive.apply(glam::Vec4::new(0.75, 0.25, 0.0, 0.0), dst),
            glam::Vec4::new(1.0, 0.75, 0.5, 1.0)
        );
        assert_eq!(
            BlendMode::Alpha.apply(glam::Vec4::new(1.0, 0.0, 0.0, 0.5), dst),
            glam::Vec4::new(0.75, 0.25, 0.25, 1.0)
        );
    }

    #[test]
    fn not_equal_against_zero_gates_marked_values() {
        let state = StencilState::both(
            StencilFaceState::new(
                CompareFunction::NotEqual,
                StencilOperation::Keep,
                StencilOperation::Keep,
                StencilOperation::Zero,
            ),
            0,
        );

        assert!(!state.test(true, 0));
        assert!(state.test(true, 1));
        assert!(state.test(false, 255));
    }
}

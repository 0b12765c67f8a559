use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// X-y-width-height format, contains coordinates of the center of bbox and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Xywh;
impl BBoxFormat for Xywh {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline]
    pub fn as_xywh(&self) -> BBox<Xywh> {
        self.into()
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    /// Clamps the corners into `[0, width] x [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> Self {
        Self::ltrb(
            self.left().clamp(0.0, width),
            self.top().clamp(0.0, height),
            self.right().clamp(0.0, width),
            self.bottom().clamp(0.0, height),
        )
    }

    #[inline]
    pub fn area(&self) -> f32 {
        (self.right() - self.left()).max(0.0) * (self.bottom() - self.top()).max(0.0)
    }
}

impl BBox<Xywh> {
    #[inline]
    pub fn xywh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]],
            Default::default(),
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            Default::default(),
        )
    }
}

impl<'a> From<&'a BBox<Xywh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Xywh>) -> Self {
        let (w2, h2) = (v.0[2] / 2.0, v.0[3] / 2.0);

        Self(
            [v.0[0] - w2, v.0[1] - h2, v.0[0] + w2, v.0[1] + h2],
            Default::default(),
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Xywh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        let (w, h) = (v.0[2] - v.0[0], v.0[3] - v.0[1]);

        Self(
            [v.0[0] + w / 2.0, v.0[1] + h / 2.0, w, h],
            Default::default(),
        )
    }
}

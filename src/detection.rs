use crate::bbox::{BBox, Ltrb, Xywh};

/// Contains (x,y) of the center and (width,height) of bbox, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
    pub class: i32,
}

impl Detection {
    pub fn from_ltrb(bbox: BBox<Ltrb>, confidence: f32, class: i32) -> Self {
        let c = bbox.as_xywh();

        Self {
            x: c.cx(),
            y: c.cy(),
            w: c.width(),
            h: c.height(),
            confidence,
            class,
        }
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let b1_area = self.w * self.h;
        let b2_area = other.w * other.h;

        let i_xmin = self.xmin().max(other.xmin());
        let i_xmax = self.xmax().min(other.xmax());
        let i_ymin = self.ymin().max(other.ymin());
        let i_ymax = self.ymax().min(other.ymax());
        let i_area = (i_xmax - i_xmin).max(0.) * (i_ymax - i_ymin).max(0.);

        let union = b1_area + b2_area - i_area;
        if union <= 0.0 {
            return 0.0;
        }

        i_area / union
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Xywh> {
        BBox::xywh(self.x, self.y, self.w, self.h)
    }

    #[inline(always)]
    pub fn ltrb(&self) -> BBox<Ltrb> {
        self.bbox().as_ltrb()
    }

    #[inline(always)]
    pub fn xmax(&self) -> f32 {
        self.x + self.w / 2.
    }

    #[inline(always)]
    pub fn ymax(&self) -> f32 {
        self.y + self.h / 2.
    }

    #[inline(always)]
    pub fn xmin(&self) -> f32 {
        self.x - self.w / 2.
    }

    #[inline(always)]
    pub fn ymin(&self) -> f32 {
        self.y - self.h / 2.
    }
}

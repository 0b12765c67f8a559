use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::detection::Detection;
use crate::error::Error;

pub const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Class id to display name table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl Default for ClassNames {
    fn default() -> Self {
        Self::coco()
    }
}

impl ClassNames {
    pub fn coco() -> Self {
        Self::new(COCO_NAMES.iter().map(|s| s.to_string()))
    }

    pub fn new<I: IntoIterator<Item = String>>(names: I) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Reads one class name per line; blank lines are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;

        Ok(Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        ))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class: i32) -> String {
        usize::try_from(class)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("class{}", class))
    }

    pub fn id(&self, name: &str) -> Option<i32> {
        self.names.iter().position(|n| n == name).map(|i| i as i32)
    }
}

/// Splits a comma separated class list into a sorted set of names.
pub fn parse_class_list(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Allow-list of class ids. An empty list keeps everything.
#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    keep: Option<HashSet<i32>>,
}

impl ClassFilter {
    pub fn new(names: &ClassNames, allow: &BTreeSet<String>) -> Self {
        if allow.is_empty() {
            return Self::all();
        }

        let mut keep = HashSet::new();
        for name in allow {
            match names.id(name) {
                Some(id) => {
                    keep.insert(id);
                }
                None => log::warn!("class `{}` is not known to the model, ignoring", name),
            }
        }

        if keep.is_empty() {
            log::warn!("none of the requested classes are known, keeping every class");
            return Self::all();
        }

        Self { keep: Some(keep) }
    }

    pub fn all() -> Self {
        Self { keep: None }
    }

    #[inline]
    pub fn accepts(&self, class: i32) -> bool {
        match &self.keep {
            Some(keep) => keep.contains(&class),
            None => true,
        }
    }

    pub fn retain(&self, dets: &mut Vec<Detection>) {
        if self.keep.is_some() {
            dets.retain(|d| self.accepts(d.class));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class: i32) -> Detection {
        Detection {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
            confidence: 0.5,
            class,
        }
    }

    #[test]
    fn parse_list_trims_and_dedupes() {
        let list = parse_class_list(" dog, person,,cat ,dog");
        let v: Vec<_> = list.iter().map(String::as_str).collect();
        assert_eq!(v, ["cat", "dog", "person"]);
    }

    #[test]
    fn coco_lookup() {
        let names = ClassNames::coco();
        assert_eq!(names.len(), 80);
        assert_eq!(names.id("person"), Some(0));
        assert_eq!(names.id("dog"), Some(16));
        assert_eq!(names.name(15), "cat");
        assert_eq!(names.name(80), "class80");
        assert_eq!(names.name(-1), "class-1");
    }

    #[test]
    fn filter_keeps_allowed_classes() {
        let names = ClassNames::coco();
        let filter = ClassFilter::new(&names, &parse_class_list("person,dog,cat"));
        let mut dets = vec![det(0), det(2), det(16), det(15), det(7)];
        filter.retain(&mut dets);

        let classes: Vec<_> = dets.iter().map(|d| d.class).collect();
        assert_eq!(classes, [0, 16, 15]);
    }

    #[test]
    fn unknown_names_are_ignored() {
        let names = ClassNames::coco();
        let filter = ClassFilter::new(&names, &parse_class_list("unicorn,dog"));
        assert!(filter.accepts(16));
        assert!(!filter.accepts(0));
    }

    #[test]
    fn all_unknown_names_keep_everything() {
        let names = ClassNames::new(["helmet".to_string(), "vest".to_string()]);
        let filter = ClassFilter::new(&names, &parse_class_list("person,dog,cat"));
        let mut dets = vec![det(0), det(1), det(16)];
        filter.retain(&mut dets);

        assert!(filter.accepts(0));
        assert_eq!(dets.len(), 3);
    }

    #[test]
    fn empty_list_keeps_everything() {
        let filter = ClassFilter::new(&ClassNames::coco(), &BTreeSet::new());
        let mut dets = vec![det(0), det(79), det(123)];
        filter.retain(&mut dets);
        assert_eq!(dets.len(), 3);
    }

    #[test]
    fn names_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"helmet\n\n vest \nboots\n").unwrap();

        let names = ClassNames::from_file(file.path()).unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.name(1), "vest");
    }
}

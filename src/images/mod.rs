//! Image assets: descriptive renames and size control.

pub mod recompress;

use std::collections::{HashMap, HashSet};

use crate::archive::Archive;
use crate::content::image_references;
use crate::package::Package;
use crate::rename::RenameMap;
use crate::report::Warning;
use crate::slug::slugify;
use crate::util::{parent_dir, resolve_href, split_extension};

/// Renames that give images descriptive names, and the candidates that were refused.
#[derive(Debug, Default)]
pub struct RenamePlan {
    pub renames: RenameMap,
    pub collisions: Vec<Warning>,
}

/// Plan a descriptive name for every image referenced with alt text.
///
/// Content documents are scanned in manifest order and the first alt text
/// seen for an image decides its name. A name is refused, and the image
/// keeps its generated one, when its slug already went to another image or
/// the target path is taken.
pub fn plan_renames(archive: &Archive, package: &Package, skip: &[&str]) -> RenamePlan {
    let mut plan = RenamePlan::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut slugs: HashMap<String, String> = HashMap::new();

    for doc in package.content_documents(None) {
        let Some(text) = archive.text(&doc.path) else {
            continue;
        };
        let doc_dir = parent_dir(&doc.path);

        for (src, alt) in image_references(&text) {
            let path = resolve_href(doc_dir, &src);
            if skip.contains(&path.as_str()) || !archive.contains(&path) || !seen.insert(path.clone()) {
                continue;
            }

            let slug = slugify(&alt);
            let (stem, extension) = split_extension(&path);
            let target = match extension {
                Some(ext) => format!("{}{slug}.{ext}", parent_dir(stem)),
                None => format!("{}{slug}", parent_dir(stem)),
            };
            if target == path {
                continue;
            }

            let taken_by_other = slugs.get(&slug).is_some_and(|owner| *owner != path);
            if taken_by_other || archive.contains(&target) {
                plan.collisions.push(Warning::SlugCollision { image: path, slug });
                continue;
            }

            slugs.insert(slug, path.clone());
            plan.renames.insert(path, target);
        }
    }

    plan
}

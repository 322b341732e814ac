//! Detection engine: rank plugins against a file, then parse with the winner.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::container::Container;
use crate::context::{Control, ParseContext};
use crate::patch::{self, Patch};
use crate::plugin::FormatPlugin;
use crate::resource::{Extraction, Resource};
use crate::{Error, Result, formats};

/// A plugin's score for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct Ranked {
    pub plugin: FormatPlugin,
    /// Registration index, used to break ties.
    pub index: usize,
    pub score: u8,
}

/// Plugin registry plus configuration. Holds no per-file state, so one
/// engine can serve many threads.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    plugins: Vec<FormatPlugin>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_builtin(EngineConfig::default())
    }
}

impl Engine {
    /// An engine with no plugins.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            plugins: Vec::new(),
        }
    }

    /// An engine with every built-in format registered.
    pub fn with_builtin(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        for plugin in formats::builtin() {
            engine.register(plugin);
        }
        engine
    }

    /// Add a plugin. Earlier registrations win ties.
    pub fn register(&mut self, plugin: FormatPlugin) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(&self) -> &[FormatPlugin] {
        &self.plugins
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn candidates(&self, container: &Container, hint: Option<&str>) -> Vec<(usize, FormatPlugin)> {
        let all = || self.plugins.iter().copied().enumerate().collect::<Vec<_>>();
        if self.config.scan_all {
            return all();
        }
        let ext = match hint {
            Some(h) => Some(h.trim_start_matches('.').to_ascii_lowercase()),
            None => container.extension(),
        };
        let Some(ext) = ext else {
            return all();
        };
        let declared: Vec<_> = self
            .plugins
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.declares(&ext))
            .collect();
        if declared.is_empty() { all() } else { declared }
    }

    /// Score candidates, highest first; ties keep registration order.
    ///
    /// `hint` overrides the container's extension for candidate selection.
    pub fn rank(&self, container: &Container, hint: Option<&str>) -> Vec<Ranked> {
        let candidates = self.candidates(container, hint);
        let limits = self.config.limits;
        let score = |&(index, plugin): &(usize, FormatPlugin)| Ranked {
            plugin,
            index,
            score: plugin.evaluate(container, limits),
        };
        let mut ranked: Vec<Ranked> = if self.config.parallel {
            candidates.par_iter().map(score).collect()
        } else {
            candidates.iter().map(score).collect()
        };
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.index.cmp(&b.index)));
        for r in &ranked {
            debug!("{}: {} scored {}", container.path().display(), r.plugin.id, r.score);
        }
        ranked
    }

    /// The best accepted candidate.
    pub fn detect(&self, container: &Container, hint: Option<&str>) -> Result<Ranked> {
        self.rank(container, hint)
            .into_iter()
            .find(|r| r.score >= self.config.min_score)
            .ok_or_else(|| Error::NotRecognized {
                path: container.path().to_path_buf(),
            })
    }

    /// Detect and parse.
    pub fn open(&self, container: &Container, hint: Option<&str>) -> Result<Archive> {
        self.open_with(container, hint, &Control::new())
    }

    /// Detect and parse under a caller-held [`Control`].
    pub fn open_with(
        &self,
        container: &Container,
        hint: Option<&str>,
        control: &Control,
    ) -> Result<Archive> {
        let accepted: Vec<Ranked> = self
            .rank(container, hint)
            .into_iter()
            .filter(|r| r.score >= self.config.min_score)
            .collect();
        if accepted.is_empty() {
            return Err(Error::NotRecognized {
                path: container.path().to_path_buf(),
            });
        }

        let mut first_failure = None;
        for candidate in accepted {
            let ctx = ParseContext::new(container, self.config.limits, control.clone());
            match (candidate.plugin.parse)(&ctx) {
                Ok(resources) => {
                    debug!(
                        "{}: parsed as {} ({} resources)",
                        container.path().display(),
                        candidate.plugin.id,
                        resources.len()
                    );
                    return Ok(Archive {
                        plugin: candidate.plugin,
                        score: candidate.score,
                        container: container.clone(),
                        resources,
                    });
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(source) => {
                    let err = Error::Corrupt {
                        path: container.path().to_path_buf(),
                        format: candidate.plugin.id,
                        score: candidate.score,
                        source: Box::new(source),
                    };
                    if !self.config.retry_next {
                        return Err(err);
                    }
                    warn!("{err}; trying next candidate");
                    first_failure.get_or_insert(err);
                }
            }
        }
        Err(first_failure.unwrap_or_else(|| Error::NotRecognized {
            path: container.path().to_path_buf(),
        }))
    }

    /// Open the file at `path` and parse it.
    pub fn open_path(&self, path: impl AsRef<Path>) -> Result<Archive> {
        let container = Container::open(path)?;
        self.open(&container, None)
    }
}

/// A recognized container and its resources.
#[derive(Debug, Clone)]
pub struct Archive {
    plugin: FormatPlugin,
    score: u8,
    container: Container,
    resources: Vec<Resource>,
}

impl Archive {
    /// The plugin that parsed this archive.
    pub fn format(&self) -> &FormatPlugin {
        &self.plugin
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index)
    }

    /// First resource with exactly this name.
    pub fn find(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name() == name)
    }

    pub fn extract(&self, index: usize) -> Result<Extraction> {
        self.resources
            .get(index)
            .ok_or(Error::InvalidRange)?
            .extract()
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    /// Rewrite the directory fields of resource `index` in place and return
    /// the updated resource.
    ///
    /// Only formats registered as writable and file-backed containers can be
    /// patched. The new range must already exist in the file.
    pub fn patch(&mut self, index: usize, patch: Patch) -> Result<Resource> {
        if !self.plugin.writable {
            return Err(Error::ReadOnly {
                format: self.plugin.id,
            });
        }
        let resource = self.resources.get(index).ok_or(Error::InvalidRange)?;
        let backing = resource.container();
        if !backing.is_file() {
            return Err(Error::Patch("container is not backed by a file"));
        }
        let path = backing.path().to_path_buf();
        let size = fs::metadata(&path)
            .map_err(|source| Error::FileOpen {
                path: path.clone(),
                source,
            })?
            .len();

        let plan = patch::plan(resource, &patch, size)?;
        patch::apply(&path, &plan)?;

        let reopened = Container::open(&path)?;
        let updated = resource.repointed(&reopened, plan.offset, plan.length, plan.decompressed);
        if self.container.path() == path {
            self.container = reopened;
        }
        self.resources[index] = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{ParseFn, Probe, Score, ScoreFn, weight};

    fn nothing(_: &ParseContext<'_>) -> Result<Vec<Resource>> {
        Ok(Vec::new())
    }

    fn broken(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
        ctx.check_offset(ctx.container().size() + 1)?;
        Ok(Vec::new())
    }

    fn one(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
        Ok(vec![Resource::new(ctx.container(), "all", 0, ctx.container().size())])
    }

    fn fifty(_: &mut Probe<'_>) -> Result<u32> {
        Ok(50)
    }

    fn magic_ab(p: &mut Probe<'_>) -> Result<u32> {
        let mut s = Score::new();
        s.add(p.extension_points(&["ab"]));
        if s.check(p.magic_at(0, b"AB")?, weight::MAGIC) {
            s.check(p.size() >= 4, weight::PLAUSIBLE);
        }
        Ok(s.value())
    }

    fn plugin(
        id: &'static str,
        ext: &'static [&'static str],
        score: ScoreFn,
        parse: ParseFn,
    ) -> FormatPlugin {
        FormatPlugin {
            id,
            name: id,
            extensions: ext,
            platforms: &[],
            writable: false,
            score,
            parse,
        }
    }

    fn engine(config: EngineConfig, plugins: &[FormatPlugin]) -> Engine {
        let mut e = Engine::new(config);
        for p in plugins {
            e.register(*p);
        }
        e
    }

    #[test]
    fn ties_go_to_earlier_registration() {
        let e = engine(
            EngineConfig::new().parallel(true),
            &[plugin("first", &[], fifty, one), plugin("second", &[], fifty, nothing)],
        );
        let c = Container::from_bytes("x.bin", vec![0u8; 8]);
        let ranked = e.rank(&c, None);
        assert_eq!(ranked[0].plugin.id, "first");
        assert_eq!(e.open(&c, None).unwrap().format().id, "first");
    }

    #[test]
    fn extension_filter_falls_back_to_all() {
        let e = engine(
            EngineConfig::new(),
            &[plugin("ab", &["ab"], magic_ab, one), plugin("any", &["zz"], fifty, one)],
        );
        let c = Container::from_bytes("x.ab", b"ABCD".to_vec());
        assert_eq!(e.rank(&c, None).len(), 1);
        let c = Container::from_bytes("x.unknown", b"ABCD".to_vec());
        assert_eq!(e.rank(&c, None).len(), 2);
        // The hint narrows an otherwise unknown extension.
        assert_eq!(e.rank(&c, Some(".AB")).len(), 1);
    }

    #[test]
    fn below_threshold_is_not_recognized() {
        let e = engine(EngineConfig::new(), &[plugin("ab", &["ab"], magic_ab, one)]);
        let c = Container::from_bytes("x.ab", b"XYZW".to_vec());
        let err = e.open(&c, None).unwrap_err();
        assert!(err.is_not_recognized());
        assert!(e.detect(&c, None).is_err());
    }

    #[test]
    fn parse_failure_is_corrupt_and_retry_moves_on() {
        let plugins = [plugin("broken", &[], fifty, broken), plugin("ok", &[], fifty, one)];
        let c = Container::from_bytes("x.bin", vec![0u8; 8]);

        let strict = engine(EngineConfig::new().parallel(false), &plugins);
        let err = strict.open(&c, None).unwrap_err();
        assert!(err.is_corrupt());
        assert!(matches!(err, Error::Corrupt { format: "broken", score: 50, .. }));

        let lenient = engine(EngineConfig::new().retry_next(true), &plugins);
        let archive = lenient.open(&c, None).unwrap();
        assert_eq!(archive.format().id, "ok");
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.find("all").unwrap().compressed_length(), 8);
    }

    #[test]
    fn retry_reports_first_failure() {
        let plugins = [plugin("a", &[], fifty, broken), plugin("b", &[], fifty, broken)];
        let e = engine(EngineConfig::new().retry_next(true), &plugins);
        let c = Container::from_bytes("x.bin", vec![0u8; 8]);
        assert!(matches!(e.open(&c, None), Err(Error::Corrupt { format: "a", .. })));
    }

    #[test]
    fn read_only_formats_refuse_patches() {
        let e = engine(EngineConfig::new(), &[plugin("ro", &[], fifty, one)]);
        let c = Container::from_bytes("x.bin", vec![0u8; 8]);
        let mut archive = e.open(&c, None).unwrap();
        assert!(matches!(
            archive.patch(0, Patch::new().length(4)),
            Err(Error::ReadOnly { format: "ro" })
        ));
    }
}

use std::fs;
use std::thread;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use smartextends_source::FilesystemSource;
use smartextends_source::MemorySource;
use smartextends_templates::CacheKey;
use smartextends_templates::Context;
use smartextends_templates::Engine;
use smartextends_templates::EngineBuilder;
use smartextends_templates::TemplateError;
use tempfile::TempDir;

const CHANGE_FORM: &str = "admin/change_form.html";

/// A project template directory plus a vendored admin app, laid out on disk.
struct Project {
    _dir: TempDir,
    templates: Utf8PathBuf,
    admin_app: Utf8PathBuf,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
        let project = Self {
            templates: root.join("templates"),
            admin_app: root.join("vendor/admin"),
            _dir: dir,
        };

        project.vendor(
            "admin/base.html",
            "<html>{% block title %}Admin{% endblock %}|{% block content %}{% endblock %}</html>",
        );
        project.vendor(
            CHANGE_FORM,
            "{% extends 'admin/base.html' %}{% block content %}<form>{% block object_tools %}history{% endblock %}</form>{% endblock %}",
        );
        project
    }

    fn write(dir: &Utf8Path, name: &str, content: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project(&self, name: &str, content: &str) {
        Self::write(&self.templates, name, content);
    }

    fn vendor(&self, name: &str, content: &str) {
        Self::write(&self.admin_app.join("templates"), name, content);
    }

    /// Add the project directory, then the vendored app.
    fn sources(&self, builder: EngineBuilder) -> EngineBuilder {
        builder
            .source(FilesystemSource::new([self.templates.clone()]))
            .source(FilesystemSource::app_directories([self.admin_app.clone()]))
    }

    fn engine(&self) -> Engine {
        self.engine_with(Engine::builder())
    }

    fn engine_with(&self, builder: EngineBuilder) -> Engine {
        self.sources(builder).build().unwrap()
    }
}

mod same_name {
    use super::*;

    #[test]
    fn test_project_template_overrides_one_block() {
        let project = Project::new();
        project.project(
            CHANGE_FORM,
            "{% smart_extends 'admin/change_form.html' %}{% block object_tools %}Overwriting the change_form template{% endblock %}",
        );

        let rendered = project
            .engine()
            .render_to_string(CHANGE_FORM, &Context::new())
            .unwrap();
        insta::assert_snapshot!(rendered, @"<html>Admin|<form>Overwriting the change_form template</form></html>");
    }

    #[test]
    fn test_block_super_reaches_vendor_content() {
        let project = Project::new();
        project.project(
            CHANGE_FORM,
            "{% smart_extends 'admin/change_form.html' %}{% block object_tools %}{{ block.super }} + export{% endblock %}{% block title %}{{ title|default:'Admin' }}: {{ block.super }}{% endblock %}",
        );

        let rendered = project
            .engine()
            .render_to_string(CHANGE_FORM, &Context::new().with("title", "Change <user>"))
            .unwrap();
        insta::assert_snapshot!(rendered, @"<html>Change &lt;user&gt;: Admin|<form>history + export</form></html>");
    }

    #[test]
    fn test_vendor_template_renders_alone_without_project_override() {
        let project = Project::new();
        let rendered = project
            .engine()
            .render_to_string(CHANGE_FORM, &Context::new())
            .unwrap();
        assert_eq!(rendered, "<html>Admin|<form>history</form></html>");
    }

    #[test]
    fn test_plain_extends_of_same_name_is_rejected() {
        let project = Project::new();
        project.project(CHANGE_FORM, "{% extends 'admin/change_form.html' %}");

        let err = project
            .engine()
            .render_to_string(CHANGE_FORM, &Context::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Template 'admin/change_form.html' cannot extend itself"
        );
    }

    #[test]
    fn test_overwrite_extends_makes_plain_extends_smart() {
        let project = Project::new();
        project.project(
            CHANGE_FORM,
            "{% extends 'admin/change_form.html' %}{% block object_tools %}project{% endblock %}",
        );

        let engine = project.engine_with(Engine::builder().overwrite_extends(true));
        assert_eq!(
            engine
                .render_to_string(CHANGE_FORM, &Context::new())
                .unwrap(),
            "<html>Admin|<form>project</form></html>"
        );
    }

    #[test]
    fn test_missing_next_source_is_a_syntax_error() {
        let project = Project::new();
        project.project(
            "registration/login.html",
            "{% smart_extends 'registration/login.html' %}",
        );

        let err = project
            .engine()
            .render_to_string("registration/login.html", &Context::new())
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::Syntax {
                message: "Template 'registration/login.html' cannot be extended, because it doesn't exist"
                    .to_string(),
                span: None,
            }
        );
    }
}

mod three_sources {
    use super::*;

    /// Project directory, vendored app, then a database-backed source, each
    /// supplying the change form.
    fn engine(project: &Project, cached: bool) -> Engine {
        project.project(
            CHANGE_FORM,
            "{% smart_extends 'admin/change_form.html' %}{% block object_tools %}project / {{ block.super }}{% endblock %}",
        );
        project.vendor(
            CHANGE_FORM,
            "{% smart_extends 'admin/change_form.html' %}{% block object_tools %}vendor / {{ block.super }}{% endblock %}",
        );
        let database = MemorySource::new("database")
            .with_template(
                CHANGE_FORM,
                "{% extends 'admin/base.html' %}{% block content %}<form>{% block object_tools %}database{% endblock %}</form>{% endblock %}",
            );

        project
            .sources(Engine::builder().cached(cached))
            .source(database)
            .build()
            .unwrap()
    }

    #[test]
    fn test_each_source_delegates_to_the_next() {
        let project = Project::new();
        for cached in [true, false] {
            let rendered = engine(&project, cached)
                .render_to_string(CHANGE_FORM, &Context::new())
                .unwrap();
            assert_eq!(
                rendered,
                "<html>Admin|<form>project / vendor / database</form></html>"
            );
        }
    }

    #[test]
    fn test_inheritance_path() {
        let project = Project::new();
        let engine = engine(&project, true);

        let path: Vec<String> = engine
            .inheritance(CHANGE_FORM, &Context::new())
            .unwrap()
            .iter()
            .map(|template| {
                let origin = template.origin().unwrap();
                format!("{} {}", origin.source(), template.name())
            })
            .collect();
        assert_eq!(
            path,
            vec![
                "filesystem#0 admin/change_form.html",
                "app_directories#1 admin/change_form.html",
                "database#2 admin/change_form.html",
                "app_directories#1 admin/base.html",
            ]
        );
    }

    #[test]
    fn test_skipped_lookups_have_their_own_cache_entries() {
        let project = Project::new();
        let engine = engine(&project, true);
        engine
            .render_to_string(CHANGE_FORM, &Context::new())
            .unwrap();

        let cache = engine.cache().unwrap();
        let first = engine.get_template(CHANGE_FORM).unwrap();
        let second = engine
            .get_template_skipping(CHANGE_FORM, first.origin().unwrap())
            .unwrap();

        assert!(cache.contains(&CacheKey::new(CHANGE_FORM, None, None)));
        assert!(cache.contains(&CacheKey::new(CHANGE_FORM, None, first.origin())));
        assert!(cache.contains(&CacheKey::new(CHANGE_FORM, None, second.origin())));
        assert!(cache.contains(&CacheKey::new("admin/base.html", None, None)));
        assert_eq!(cache.len(), 4);

        cache.reset();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_find_template_returns_raw_source() {
        let project = Project::new();
        let engine = engine(&project, true);

        let (_, first) = engine.find_template(CHANGE_FORM, None, None).unwrap();
        let (content, next) = engine
            .find_template(CHANGE_FORM, None, Some(&first))
            .unwrap();
        assert!(content.contains("vendor / "));
        assert_eq!(next.source().key(), "app_directories");
        assert!(engine.cache().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_renders_agree() {
        let project = Project::new();
        let engine = &engine(&project, true);

        let outputs: Vec<String> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || {
                        engine
                            .render_to_string(CHANGE_FORM, &Context::new())
                            .unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert!(outputs
            .iter()
            .all(|output| output == "<html>Admin|<form>project / vendor / database</form></html>"));
    }
}

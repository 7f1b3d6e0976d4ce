//! Route tree construction from API definitions.
//!
//! # Responsibilities
//! - Walk definitions field by field, in declaration order
//! - Bind handler fields for every (method, route) pair
//! - Create or reuse version and nested groups
//! - Install the static asset fallback
//! - Compile the result into an immutable `axum::Router`
//!
//! # Design Decisions
//! - Build is single-threaded and happens before any connection is accepted
//! - The first malformed field stops the build with a [`BuildError`]
//! - Duplicate bindings are rejected here rather than at serve time

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use axum::extract::Request;
use axum::routing::MethodRouter;
use axum::Router;

use crate::http::assets::{self, AssetSource};
use crate::routing::definition::{Api, Definition, Field, Handler};
use crate::routing::error::{BuildError, BuildErrorKind};
use crate::routing::method::RouteMethod;
use crate::routing::resolve::resolve;
use crate::routing::tag::{require, Tag, TagSpec};

/// Prefix under which every version group is mounted.
pub const API_PREFIX: &str = "/api";

pub const METHOD_TAG: &str = "method";
pub const ROUTE_TAG: &str = "route";
pub const GROUP_TAG: &str = "group";

/// A path segment under which bindings are registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    path: String,
}

impl Group {
    fn new(path: String) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn child(&self, name: &str) -> Group {
        Group::new(join_path(&self.path, name))
    }

    /// Absolute path for a route declared in this group. Empty is the group root.
    fn route(&self, route: &str) -> String {
        join_path(&self.path, route)
    }
}

fn join_path(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), relative.trim_start_matches('/'))
}

/// Captures declared by `path`, each keyed by the shape of the prefix before
/// it (capture names erased). Two captures with the same key but different
/// spelling cannot coexist in the router.
fn route_captures(path: &str) -> Result<Vec<(String, String)>, String> {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let mut shape = String::new();
    let mut captures = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(format!("segment {segment:?} must be written as {{name}} or {{*name}}"));
        }
        let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            if segment.contains(['{', '}']) {
                return Err(format!("segment {segment:?} has unbalanced braces"));
            }
            shape.push('/');
            shape.push_str(segment);
            continue;
        };

        let catch_all = name.starts_with('*');
        let bare = name.strip_prefix('*').unwrap_or(name);
        if bare.is_empty() || bare.contains(['{', '}', '*']) {
            return Err(format!("capture {segment:?} has an invalid name"));
        }
        if catch_all && i + 1 != segments.len() {
            return Err(format!("catch-all {segment:?} must be the last segment"));
        }
        captures.push((shape.clone(), segment.to_string()));
        shape.push_str("/{}");
    }
    Ok(captures)
}

/// A single (method, path) registration.
#[derive(Clone)]
pub struct Binding {
    pub method: RouteMethod,
    pub path: String,
    handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Accumulates bindings from one or more API definitions.
#[derive(Default)]
pub struct RouteTreeBuilder {
    bindings: Vec<Binding>,
    bound: HashSet<(RouteMethod, String)>,
    versions: BTreeMap<u32, Group>,
    groups: BTreeSet<String>,
    captures: HashMap<String, String>,
    fallback: Option<Arc<dyn AssetSource>>,
}

impl RouteTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API under `/api/v<version>`.
    ///
    /// APIs sharing a version compose into the same subtree.
    pub fn add_api<A: Api + ?Sized>(&mut self, api: &A) -> Result<(), BuildError> {
        let version = api.version();
        let group = self.version_group(version);
        self.introspect(api, &group)
            .map_err(|e| e.within(format!("{}(v{})", api.type_name(), version)))
    }

    fn version_group(&mut self, version: u32) -> Group {
        if let Some(group) = self.versions.get(&version) {
            tracing::debug!(version, "Reusing version group");
            return group.clone();
        }
        let group = Group::new(format!("{API_PREFIX}/v{version}"));
        tracing::debug!(version, path = %group.path, "Version group created");
        self.versions.insert(version, group.clone());
        group
    }

    fn child_group(&mut self, parent: &Group, name: &str) -> Group {
        let child = parent.child(name);
        if self.groups.insert(child.path.clone()) {
            tracing::debug!(path = %child.path, "Group created");
        } else {
            tracing::debug!(path = %child.path, "Reusing group");
        }
        child
    }

    fn introspect<D: Definition + ?Sized>(&mut self, definition: &D, group: &Group) -> Result<(), BuildError> {
        let owner = definition.type_name();
        for field in definition.fields() {
            self.register_field(owner, &field, group)?;
        }
        Ok(())
    }

    fn register_field(&mut self, owner: &str, field: &Field, group: &Group) -> Result<(), BuildError> {
        let fail = |kind: BuildErrorKind| BuildError::new(owner, field.name(), &group.path, kind);

        if !field.is_exported() {
            return Err(fail(BuildErrorKind::Unexported));
        }

        if let Some(handler) = resolve::<Arc<dyn Handler>>(field.value()) {
            return self.register_handler(handler, field.tag(), group).map_err(fail);
        }

        if let Some(source) = resolve::<Arc<dyn AssetSource>>(field.value()) {
            if self.fallback.is_some() {
                return Err(fail(BuildErrorKind::DuplicateFallback));
            }
            tracing::debug!(owner, field = field.name(), "Static asset fallback installed");
            self.fallback = Some(source);
            return Ok(());
        }

        let name: String = require(field.tag(), TagSpec::required(GROUP_TAG)).map_err(|e| fail(e.into()))?;
        let definition = field
            .value()
            .as_struct()
            .cloned()
            .ok_or_else(|| fail(BuildErrorKind::NotAGroup(field.value().kind())))?;
        let child = self.child_group(group, &name);
        self.introspect(definition.as_ref(), &child)
            .map_err(|e| e.within(format!("{owner}({})", field.name())))
    }

    /// Bind every (method, route) pair. Nothing is bound if any pair is invalid.
    fn register_handler(&mut self, handler: Arc<dyn Handler>, tag: &Tag, group: &Group) -> Result<(), BuildErrorKind> {
        let methods = require::<Vec<String>>(tag, TagSpec::required(METHOD_TAG))?
            .iter()
            .map(|m| m.parse::<RouteMethod>())
            .collect::<Result<Vec<_>, _>>()?;
        let routes: Vec<String> = require(tag, TagSpec::required(ROUTE_TAG).allow_empty())?;

        let mut paths = Vec::with_capacity(routes.len());
        let mut new_captures: Vec<(String, String)> = Vec::new();
        for route in &routes {
            let path = group.route(route);
            let found = route_captures(&path).map_err(|reason| BuildErrorKind::InvalidRoute {
                path: path.clone(),
                reason,
            })?;
            for (shape, capture) in found {
                let existing = self
                    .captures
                    .get(&shape)
                    .or_else(|| new_captures.iter().find(|(s, _)| *s == shape).map(|(_, c)| c))
                    .cloned();
                match existing {
                    Some(existing) if existing != capture => {
                        return Err(BuildErrorKind::InvalidRoute {
                            path,
                            reason: format!("capture {capture} conflicts with {existing} bound earlier"),
                        });
                    }
                    Some(_) => {}
                    None => new_captures.push((shape, capture)),
                }
            }
            paths.push(path);
        }

        let mut pending: Vec<(RouteMethod, String)> = Vec::with_capacity(methods.len() * paths.len());
        for method in methods {
            for path in &paths {
                let key = (method, path.clone());
                if self.bound.contains(&key) || pending.contains(&key) {
                    return Err(BuildErrorKind::DuplicateBinding { method: key.0, path: key.1 });
                }
                pending.push(key);
            }
        }

        self.captures.extend(new_captures);
        for (method, path) in pending {
            tracing::debug!(method = %method, path = %path, "Route bound");
            self.bound.insert((method, path.clone()));
            self.bindings.push(Binding {
                method,
                path,
                handler: handler.clone(),
            });
        }
        Ok(())
    }

    /// Bindings registered so far, in registration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Versions with a group, ascending.
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.versions.keys().copied()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Compile into an immutable route tree.
    pub fn build(self) -> RouteTree {
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut routes = Vec::with_capacity(self.bindings.len());

        for binding in self.bindings {
            let handler = binding.handler;
            let method_router = by_path.remove(&binding.path).unwrap_or_default();
            let method_router = method_router.on(binding.method.filter(), move |request: Request| {
                let handler = handler.clone();
                async move { handler.serve(request).await }
            });
            routes.push((binding.method, binding.path.clone()));
            by_path.insert(binding.path, method_router);
        }

        let has_fallback = self.fallback.is_some();
        let fallback = self
            .fallback
            .map(|source| move |request: Request| assets::fallback(source.clone(), request));

        // A known path with an unbound method also falls through to the assets.
        let mut router = Router::new();
        for (path, mut method_router) in by_path {
            if let Some(fallback) = &fallback {
                method_router = method_router.fallback(fallback.clone());
            }
            router = router.route(&path, method_router);
        }
        if let Some(fallback) = fallback {
            router = router.fallback(fallback);
        }

        tracing::info!(
            routes = routes.len(),
            versions = self.versions.len(),
            static_fallback = has_fallback,
            "Route tree built"
        );

        RouteTree {
            router,
            routes,
            has_fallback,
        }
    }
}

/// A compiled, read-only route tree.
pub struct RouteTree {
    router: Router,
    routes: Vec<(RouteMethod, String)>,
    has_fallback: bool,
}

impl RouteTree {
    pub fn routes(&self) -> &[(RouteMethod, String)] {
        &self.routes
    }

    pub fn has_fallback(&self) -> bool {
        self.has_fallback
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::assets::MemoryAssets;
    use crate::routing::definition::{handler_fn, Value};
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn echo(label: &'static str) -> Value {
        Value::handler(handler_fn(move |req: Request| async move {
            format!("{label} {} {}", req.method(), req.uri().path())
        }))
    }

    struct Items;

    impl Definition for Items {
        fn fields(&self) -> Vec<Field> {
            vec![Field::new("List", r#"method:"GET,post" route:",sub""#, echo("items"))]
        }
    }

    struct Store {
        version: u32,
        group: &'static str,
    }

    impl Definition for Store {
        fn fields(&self) -> Vec<Field> {
            vec![Field::new("Items", &format!(r#"group:"{}""#, self.group), Value::group(Items))]
        }
    }

    impl Api for Store {
        fn version(&self) -> u32 {
            self.version
        }
    }

    fn paths(builder: &RouteTreeBuilder) -> Vec<String> {
        builder
            .bindings()
            .iter()
            .map(|b| format!("{} {}", b.method, b.path))
            .collect()
    }

    #[test]
    fn test_cartesian_expansion_with_group_root() {
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Store { version: 1, group: "items" }).unwrap();

        assert_eq!(
            paths(&builder),
            vec![
                "GET /api/v1/items",
                "GET /api/v1/items/sub",
                "POST /api/v1/items",
                "POST /api/v1/items/sub",
            ]
        );
    }

    #[test]
    fn test_shared_version_composes() {
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Store { version: 3, group: "a" }).unwrap();
        builder.add_api(&Store { version: 3, group: "b" }).unwrap();
        builder.add_api(&Store { version: 4, group: "a" }).unwrap();

        assert_eq!(builder.versions().collect::<Vec<_>>(), vec![3, 4]);
        let all = paths(&builder);
        assert_eq!(all.len(), 12);
        assert!(all.iter().filter(|p| p.contains("/api/v3/")).count() == 8);
        assert!(all.contains(&"GET /api/v4/a".to_string()));
    }

    #[test]
    fn test_colliding_group_names_rejected() {
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Store { version: 3, group: "a" }).unwrap();
        let err = builder.add_api(&Store { version: 3, group: "a" }).unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::DuplicateBinding { .. }));
        assert_eq!(err.trail, vec!["Store(v3)", "Store(Items)", "Items(List)"]);
        assert_eq!(builder.bindings().len(), 4);
    }

    struct Tracey;

    impl Definition for Tracey {
        fn fields(&self) -> Vec<Field> {
            vec![
                Field::new("Ok", r#"method:"GET" route:"ok""#, echo("ok")),
                Field::new("Bad", r#"method:"GET,TRACE" route:"bad""#, echo("bad")),
                Field::new("Later", r#"method:"GET" route:"later""#, echo("later")),
            ]
        }
    }

    impl Api for Tracey {
        fn version(&self) -> u32 {
            1
        }
    }

    #[test]
    fn test_unsupported_method_stops_before_binding() {
        let mut builder = RouteTreeBuilder::new();
        let err = builder.add_api(&Tracey).unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::Method(_)));
        assert_eq!(err.location(), "Tracey(Bad)");
        assert_eq!(paths(&builder), vec!["GET /api/v1/ok"]);
    }

    struct Misconfigured(Vec<Field>);

    impl Definition for Misconfigured {
        fn fields(&self) -> Vec<Field> {
            self.0.clone()
        }
    }

    impl Api for Misconfigured {
        fn version(&self) -> u32 {
            0
        }
    }

    fn build_error(fields: Vec<Field>) -> BuildErrorKind {
        RouteTreeBuilder::new()
            .add_api(&Misconfigured(fields))
            .unwrap_err()
            .kind
    }

    #[test]
    fn test_configuration_errors() {
        let hidden = Field::new("Hidden", r#"method:"GET" route:"x""#, echo("x")).private();
        assert!(matches!(build_error(vec![hidden]), BuildErrorKind::Unexported));

        let no_route = Field::new("NoRoute", r#"method:"GET""#, echo("x"));
        assert!(matches!(build_error(vec![no_route]), BuildErrorKind::Tag(_)));

        let no_group = Field::new("Nested", "", Value::group(Items));
        assert!(matches!(build_error(vec![no_group]), BuildErrorKind::Tag(_)));

        let plain = Field::new("Count", r#"group:"count""#, Value::plain("3"));
        assert!(matches!(build_error(vec![plain]), BuildErrorKind::NotAGroup("plain")));

        let nil = Field::new("Missing", r#"group:"missing""#, Value::Nil.boxed());
        assert!(matches!(build_error(vec![nil]), BuildErrorKind::NotAGroup("boxed")));

        let assets = vec![
            Field::new("Web", "", Value::assets(MemoryAssets::new())),
            Field::new("Docs", "", Value::assets(MemoryAssets::new()).boxed()),
        ];
        assert!(matches!(build_error(assets), BuildErrorKind::DuplicateFallback));
    }

    #[test]
    fn test_indirect_handlers_and_groups() {
        let fields = vec![
            Field::new("Boxed", r#"method:"GET" route:"boxed""#, echo("b").boxed().boxed()),
            Field::new("Ref", r#"method:"GET" route:"ref""#, echo("r").addressable()),
            Field::new("Nested", r#"group:"nested""#, Value::group(Items).boxed()),
        ];
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Misconfigured(fields)).unwrap();
        assert_eq!(
            paths(&builder),
            vec![
                "GET /api/v0/boxed",
                "GET /api/v0/ref",
                "GET /api/v0/nested",
                "GET /api/v0/nested/sub",
                "POST /api/v0/nested",
                "POST /api/v0/nested/sub",
            ]
        );
    }

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_compiled_tree_dispatches() {
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Store { version: 2, group: "shop" }).unwrap();
        let tree = builder.build();
        assert_eq!(tree.routes().len(), 4);
        assert!(!tree.has_fallback());

        let (status, body) = call(tree.router(), "POST", "/api/v2/shop/sub").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "items POST /api/v2/shop/sub");

        let (status, _) = call(tree.router(), "DELETE", "/api/v2/shop").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = call(tree.router(), "GET", "/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_compiled_tree_falls_back_to_assets() {
        let assets = MemoryAssets::new()
            .with_file("main.html", "<main/>")
            .with_file("app.js", "run()");
        let fields = vec![
            Field::new("Ping", r#"method:"GET" route:"ping""#, echo("ping")),
            Field::new("Web", "", Value::assets(assets)),
        ];
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Misconfigured(fields)).unwrap();
        let tree = builder.build();
        assert!(tree.has_fallback());

        assert_eq!(call(tree.router(), "GET", "/app.js").await.1, "run()");
        assert_eq!(call(tree.router(), "GET", "/settings/profile").await.1, "<main/>");
        assert_eq!(call(tree.router(), "GET", "/api/v0/ping").await.1, "ping GET /api/v0/ping");

        let (status, body) = call(tree.router(), "DELETE", "/api/v0/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<main/>");
    }

    #[test]
    fn test_colon_and_star_segments_rejected() {
        for route in ["items/:id", "files/*rest"] {
            let mut builder = RouteTreeBuilder::new();
            let fields = vec![Field::new("Item", &format!(r#"method:"GET" route:"{route}""#), echo("item"))];
            let err = builder.add_api(&Misconfigured(fields)).unwrap_err();
            assert!(matches!(err.kind, BuildErrorKind::InvalidRoute { .. }), "{route}: {err}");
            assert_eq!(err.location(), "Misconfigured(Item)");
            assert!(builder.bindings().is_empty());
        }
    }

    #[test]
    fn test_malformed_captures_rejected() {
        for route in ["a{b", "{}", "{*}", "{*rest}/tail", "x}"] {
            let fields = vec![Field::new("Item", &format!(r#"method:"GET" route:"{route}""#), echo("item"))];
            assert!(
                matches!(build_error(fields), BuildErrorKind::InvalidRoute { .. }),
                "{route} should be rejected"
            );
        }
    }

    #[test]
    fn test_conflicting_capture_names_rejected() {
        let fields = vec![
            Field::new("Get", r#"method:"GET" route:"items/{id}""#, echo("get")),
            Field::new("Tags", r#"method:"GET,PUT" route:"items/{item}/tags""#, echo("tags")),
        ];
        let mut builder = RouteTreeBuilder::new();
        let err = builder.add_api(&Misconfigured(fields)).unwrap_err();
        match &err.kind {
            BuildErrorKind::InvalidRoute { path, .. } => assert_eq!(path, "/api/v0/items/{item}/tags"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.location(), "Misconfigured(Tags)");
        assert_eq!(paths(&builder), vec!["GET /api/v0/items/{id}"]);
    }

    #[tokio::test]
    async fn test_captures_sharing_a_name_compile() {
        let fields = vec![
            Field::new("Get", r#"method:"GET,DELETE" route:"items/{id}""#, echo("item")),
            Field::new("Tags", r#"method:"GET" route:"items/{id}/tags""#, echo("tags")),
            Field::new("Files", r#"method:"GET" route:"files/{*path}""#, echo("file")),
        ];
        let mut builder = RouteTreeBuilder::new();
        builder.add_api(&Misconfigured(fields)).unwrap();
        let tree = builder.build();

        assert_eq!(call(tree.router(), "DELETE", "/api/v0/items/7").await.1, "item DELETE /api/v0/items/7");
        assert_eq!(call(tree.router(), "GET", "/api/v0/items/7/tags").await.1, "tags GET /api/v0/items/7/tags");
        assert_eq!(call(tree.router(), "GET", "/api/v0/files/a/b.txt").await.1, "file GET /api/v0/files/a/b.txt");
    }
}

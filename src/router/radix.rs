//! Radix tree for HTTP route matching.
//!
//! Paths are split into segments; static segments match exactly and `{param}`
//! segments match any single segment. Routes live on terminal nodes keyed by
//! HTTP method. Lookup is O(k) in the path length, and static children are
//! preferred over parameter children so `/computer-items/search` would win
//! over `/computer-items/{id}`.

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::ParamVec;
use crate::spec::RouteMeta;

#[derive(Clone)]
struct RadixNode {
    segment: Arc<str>,
    routes: HashMap<Method, Arc<RouteMeta>>,
    /// `{id}` -> `id`
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode>,
    /// Several names may share a position, e.g. `/users/{id}` and `/users/{user_id}/posts`
    param_children: Vec<RadixNode>,
}

impl RadixNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: Arc::from(segment),
            routes: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(param_name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(param_name)),
            ..Self::new("")
        }
    }

    fn insert(&mut self, segments: &[&str], method: Method, route: Arc<RouteMeta>) {
        let Some((segment, remaining)) = segments.split_first() else {
            self.routes.insert(method, route);
            return;
        };

        if let Some(param_name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(param_name))
            {
                child.insert(remaining, method, route);
                return;
            }
            let mut child = RadixNode::new_param(param_name);
            child.insert(remaining, method, route);
            self.param_children.push(child);
            return;
        }

        if let Some(child) = self
            .children
            .iter_mut()
            .find(|c| c.segment.as_ref() == *segment)
        {
            child.insert(remaining, method, route);
            return;
        }
        let mut child = RadixNode::new(segment);
        child.insert(remaining, method, route);
        self.children.push(child);
    }

    fn search(
        &self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
    ) -> Option<Arc<RouteMeta>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        for child in &self.children {
            if child.segment.as_ref() == *segment {
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
            }
        }

        for param_child in &self.param_children {
            if let Some(name) = &param_child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(route) = param_child.search(remaining, method, params) {
                    return Some(route);
                }
                // Backtrack
                params.pop();
            }
        }

        None
    }

    /// Methods registered at the node reached by `segments`, ignoring method.
    fn methods_at(&self, segments: &[&str]) -> Vec<Method> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.keys().cloned().collect();
        };
        let mut out = Vec::new();
        for child in &self.children {
            if child.segment.as_ref() == *segment {
                out.extend(child.methods_at(remaining));
            }
        }
        for param_child in &self.param_children {
            out.extend(param_child.methods_at(remaining));
        }
        out
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Radix tree router keyed on the full path (base path included).
#[derive(Clone)]
pub struct RadixRouter {
    root: RadixNode,
}

impl RadixRouter {
    pub fn new(routes: &[Arc<RouteMeta>]) -> Self {
        let mut root = RadixNode::new("");
        for route in routes {
            let full_path = route.full_path();
            root.insert(&split_path(&full_path), route.method.clone(), Arc::clone(route));
        }
        Self { root }
    }

    /// Find the route for `method` + `path` and the extracted path parameters.
    pub fn route(&self, method: &Method, path: &str) -> Option<(Arc<RouteMeta>, ParamVec)> {
        let segments = split_path(path);
        let mut params = ParamVec::new();
        let route = self.root.search(&segments, method, &mut params)?;
        Some((route, params))
    }

    /// Methods that would match `path` under any verb.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods = self.root.methods_at(&split_path(path));
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods.dedup();
        methods
    }
}

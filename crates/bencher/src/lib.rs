/// A route table shaped like a typical REST API, registered once per benchmark.
pub static API_ROUTES: &[&str] = &[
    "/",
    "/health",
    "/users",
    "/users/:id",
    "/users/:id/repos",
    "/users/:id/followers",
    "/users/:id/following",
    "/repos/:owner/:repo",
    "/repos/:owner/:repo/issues",
    "/repos/:owner/:repo/issues/:number",
    "/repos/:owner/:repo/issues/:number/comments",
    "/repos/:owner/:repo/pulls",
    "/repos/:owner/:repo/pulls/:number",
    "/repos/:owner/:repo/contents/*",
    "/orgs/:org",
    "/orgs/:org/members",
    "/orgs/:org/repos",
    "/search/code",
    "/search/issues",
    "/static/*",
];

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    path: &'static str,
}

impl TestCase {
    pub const fn new(name: &'static str, group: TestGroup, path: &'static str) -> Self {
        Self { name, group, path }
    }

    pub const fn hit(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Hit, path)
    }

    pub const fn miss(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Miss, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestGroup {
    Hit,
    Miss,
}

pub fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase::hit("static_root", "/"),
        TestCase::hit("static_nested", "/search/issues"),
        TestCase::hit("one_param", "/users/42"),
        TestCase::hit("three_params", "/repos/foldright/grove/issues/7/comments"),
        TestCase::hit("catch_all", "/repos/foldright/grove/contents/crates/web/src/lib.rs"),
        TestCase::miss("miss_shallow", "/nothing"),
        TestCase::miss("miss_deep", "/repos/foldright/grove/unknown/1"),
    ]
}

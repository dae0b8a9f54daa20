use std::path::{Path, PathBuf};

use swipe_compiler::{CompilerConfig, Orchestrator, Output};

const GO_MOD: &str = "module example.com/e2e\n\ngo 1.20\n";

const SERVICE: &str = r#"package app

import "context"

type ErrUnauthorized struct{}

func (ErrUnauthorized) Error() string { return "unauthorized" }

func (ErrUnauthorized) StatusCode() int { return 401 }

type User struct {
	Name string `json:"name"`
}

type AppI interface {
	Get(ctx context.Context, fname string, id int) (user User, err error)
	Ping(ctx context.Context)
}

type svc struct{}

func (svc) Get(ctx context.Context, fname string, id int) (User, error) { return User{}, ErrUnauthorized{} }

func (svc) Ping(ctx context.Context) {}
"#;

fn build_file(root: &str) -> String {
    format!(
        "//go:build swipe\n\npackage app\n\nimport (\n\t\"net/http\"\n\n\t\"github.com/swipe-io/swipe/v2\"\n)\n\nvar _ = http.MethodGet\n\nfunc Swipe() {{\n\tswipe.Build(\n\t\tswipe.{root},\n\t)\n}}\n"
    )
}

fn module(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("go.mod"), GO_MOD).unwrap();
    for (rel, src) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, src).unwrap();
    }
    dir
}

fn run(dir: &Path) -> Output {
    let config = CompilerConfig {
        js_formatter: None,
        jobs: 2,
        ..CompilerConfig::new(dir)
    };
    let output = Orchestrator::new(config).run().unwrap();
    assert!(output.failures.is_empty(), "{:?}", output.failures);
    for result in &output.results {
        assert!(result.errs.is_empty(), "{}: {:?}", result.output_path.display(), result.errs);
    }
    output
}

fn read(dir: &Path, rel: &str) -> String {
    std::fs::read_to_string(dir.join(rel)).unwrap_or_else(|e| panic!("{rel}: {e}"))
}

/// True when some line of `content`, trimmed, equals `line`.
fn has_line(content: &str, line: &str) -> bool {
    content.lines().any(|l| l.trim() == line)
}

fn generated(dir: &Path, rel: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.join(rel))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains("_gen."))
        .collect();
    names.sort();
    names
}

#[test]
fn rest_single_interface() {
    let dir = module(&[
        ("app/service.go", SERVICE),
        (
            "app/swipe.go",
            &build_file(
                "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.MethodOptions(AppI.Get, swipe.RESTPath(\"/get/{fname}\"), swipe.RESTMethod(http.MethodPost)),\n\t\t)",
            ),
        ),
    ]);
    let output = run(dir.path());
    assert_eq!(
        generated(dir.path(), "app"),
        ["endpoint_gen.go", "http_gen.go", "server_gen.go"]
    );

    let server = read(dir.path(), "app/server_gen.go");
    assert!(server.starts_with("//go:build !swipe\n// +build !swipe\n\n// Code generated by Swipe"), "{server}");
    assert!(server.contains("r.Methods(\"POST\").Path(\"/get/{fname}\").Handler(kithttp.NewServer("), "{server}");
    assert!(server.contains("vars[\"fname\"]"), "{server}");

    let endpoint = read(dir.path(), "app/endpoint_gen.go");
    assert!(has_line(&endpoint, "type GetRequest struct {"), "{endpoint}");
    assert!(has_line(&endpoint, "Fname string `json:\"fname\"`"), "{endpoint}");
    assert!(has_line(&endpoint, "Id    int    `json:\"id\"`") || has_line(&endpoint, "Id int `json:\"id\"`"), "{endpoint}");

    let paths: Vec<&PathBuf> = output.results.iter().map(|r| &r.output_path).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert!(output.results.iter().all(|r| r.pkg_path == "example.com/e2e/app"));
}

#[test]
fn jsonrpc_multiple_interfaces() {
    let second = "package app\n\nimport \"context\"\n\ntype B interface {\n\tReset(ctx context.Context) error\n}\n\ntype A interface {\n\tCreate(ctx context.Context, name string) error\n}\n";
    let dir = module(&[
        ("app/service.go", second),
        (
            "app/swipe.go",
            &build_file(concat!(
                "Service(\n\t\t\tswipe.Interface((*A)(nil), \"a\"),\n",
                "\t\t\tswipe.Interface((*B)(nil), \"b\"),\n",
                "\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.JSONRPCEnable(),\n\t\t\tswipe.JSONRPCPath(\"/rpc\"),\n\t\t)"
            )),
        ),
    ]);
    run(dir.path());

    let server = read(dir.path(), "app/server_gen.go");
    assert!(server.contains("MergeEndpointCodecMaps(MakeAEndpointCodecMap(epSetA, \"a\"), MakeBEndpointCodecMap(epSetB, \"b\"))"), "{server}");
    assert!(has_line(&server, "r.Methods(\"POST\").Path(\"/rpc\").Handler(handler)"), "{server}");
    assert!(server.contains("func MakeAEndpointCodecMap(ep AEndpointSet, ns ...string) jsonrpc.EndpointCodecMap {"), "{server}");
    assert!(server.contains("func MakeBEndpointCodecMap(ep BEndpointSet, ns ...string) jsonrpc.EndpointCodecMap {"), "{server}");
    assert!(server.contains("namespace = strings.Join(ns, \".\") + \".\""), "{server}");
}

#[test]
fn config_env_required_field() {
    let dir = module(&[
        (
            "app/config.go",
            "package app\n\ntype Config struct {\n\tFldIntReq int `env:\",required,desc:d\"`\n}\n",
        ),
        (
            "app/swipe.go",
            "//go:build swipe\n\npackage app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {\n\tswipe.Build(swipe.ConfigEnv(&Config{}, swipe.ConfigEnvDocEnable()))\n}\n",
        ),
    ]);
    run(dir.path());
    assert_eq!(generated(dir.path(), "app"), ["config_doc_gen.md", "config_gen.go"]);

    let loader = read(dir.path(), "app/config_gen.go");
    assert!(loader.contains("os.LookupEnv(\"FLD_INT_REQ\")"), "{loader}");
    assert!(has_line(&loader, "if cfg.FldIntReq == 0 {"), "{loader}");
    assert!(has_line(&loader, "errs = append(errs, errors.New(\"env FLD_INT_REQ required\"))"), "{loader}");

    let doc = read(dir.path(), "app/config_doc_gen.md");
    assert!(doc.starts_with("<!-- Code generated by Swipe"), "{doc}");
    assert!(doc.contains("|FLD_INT_REQ|<code>int</code>|d|yes|\n"), "{doc}");
}

#[test]
fn rest_client_error_decoder() {
    let dir = module(&[
        ("app/service.go", SERVICE),
        (
            "app/swipe.go",
            &build_file(
                "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.ClientsEnable([]string{\"go\"}),\n\t\t)",
            ),
        ),
    ]);
    run(dir.path());

    let http = read(dir.path(), "app/http_gen.go");
    assert!(has_line(&http, "func appIGetErrorDecode(code int) (err error) {"), "{http}");
    assert!(has_line(&http, "case 401:"), "{http}");
    assert!(has_line(&http, "err = ErrUnauthorized{}"), "{http}");
    assert!(generated(dir.path(), "app").contains(&"client_gen.go".to_string()));
}

#[test]
fn rest_client_accepts_created_for_empty_results() {
    let dir = module(&[
        ("app/service.go", SERVICE),
        (
            "app/swipe.go",
            &build_file(
                "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.ClientsEnable([]string{\"go\"}),\n\t\t)",
            ),
        ),
    ]);
    run(dir.path());

    let server = read(dir.path(), "app/server_gen.go");
    assert!(has_line(&server, "statusCode = 201"), "{server}");
    let client = read(dir.path(), "app/client_gen.go");
    assert!(has_line(&client, "if statusCode := r.StatusCode; statusCode < 200 || statusCode > 299 {"), "{client}");
    assert!(has_line(&client, "return nil, appIPingErrorDecode(statusCode)"), "{client}");
    assert!(!client.contains("StatusOK"), "{client}");
}

#[test]
fn instrumenting_middleware() {
    let dir = module(&[
        ("app/service.go", SERVICE),
        (
            "app/swipe.go",
            &build_file(
                "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.Instrumenting(swipe.Namespace(\"api\"), swipe.Subsystem(\"api\")),\n\t\t)",
            ),
        ),
    ]);
    run(dir.path());

    let code = read(dir.path(), "app/instrumenting_gen.go");
    assert!(code.contains("requestCount"), "{code}");
    assert!(code.contains("requestLatency"), "{code}");
    assert!(has_line(&code, "s.opts.requestCount.With(\"method\", \"Get\").Add(1)"), "{code}");
    assert!(code.contains("namespace: \"api\""), "{code}");
    assert!(code.contains("subsystem: \"api\""), "{code}");
}

#[test]
fn stale_files_are_swept() {
    let dir = module(&[
        ("app/service.go", SERVICE),
        (
            "app/swipe.go",
            &build_file("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t)"),
        ),
        ("app/old_gen.go", "//go:build !swipe\n\npackage app\n"),
    ]);
    run(dir.path());
    let first = generated(dir.path(), "app");
    assert!(!first.contains(&"old_gen.go".to_string()));
    assert_eq!(first, ["endpoint_gen.go", "http_gen.go", "server_gen.go"]);
    let server = read(dir.path(), "app/server_gen.go");

    run(dir.path());
    assert_eq!(generated(dir.path(), "app"), first);
    assert_eq!(read(dir.path(), "app/server_gen.go"), server);
    assert!(dir.path().join("app/service.go").exists());
}

#[test]
fn dry_run_leaves_the_tree_alone() {
    let dir = module(&[
        ("app/service.go", SERVICE),
        (
            "app/swipe.go",
            &build_file("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t)"),
        ),
        ("app/old_gen.go", "//go:build !swipe\n\npackage app\n"),
    ]);
    let config = CompilerConfig {
        js_formatter: None,
        write: false,
        ..CompilerConfig::new(dir.path())
    };
    let output = Orchestrator::new(config).run().unwrap();
    assert_eq!(output.results.len(), 1);
    assert!(output.results[0].content.contains("func MakeAppIEndpointSet(svc AppI) AppIEndpointSet {"));
    assert_eq!(generated(dir.path(), "app"), ["old_gen.go"]);
}

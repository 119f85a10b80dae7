// Integration tests for the engine driven through a headless host

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use luiscript_runtime::{
    BridgeError, Engine, Event, HeadlessHost, Host, HostValue, HttpClient, HttpError, ManualClock,
    RuntimeConfig, TaskMode,
};

fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        load_builtins: false,
        ..RuntimeConfig::default()
    }
}

fn create_engine() -> (Rc<HeadlessHost>, Engine) {
    let host = Rc::new(HeadlessHost::new());
    let engine = Engine::new(host.clone(), test_config()).with_task_mode(TaskMode::Inline);
    (host, engine)
}

fn eval(engine: &Engine, source: &str) -> Vec<HostValue> {
    engine.contexts()[0]
        .eval(source)
        .expect("Failed to evaluate chunk")
}

#[test]
fn test_one_shot_listener_fires_once() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "listeners",
            r#"
            once, always = 0, 0
            game:onnotifyonce("open", function() once = once + 1 end)
            game:onnotify("open", function() always = always + 1 end)
            "#,
        )
        .unwrap();

    engine.notify(&Event::game("open"));
    engine.notify(&Event::game("open"));

    assert_eq!(
        eval(&engine, "return once, always"),
        vec![HostValue::Integer(1), HostValue::Integer(2)]
    );
    assert_eq!(engine.contexts()[0].listener_count(), 1);
}

#[test]
fn test_listener_error_does_not_stop_siblings() {
    let (host, mut engine) = create_engine();
    engine
        .load_code(
            "faulty",
            r#"
            reached = false
            game:onnotify("tick", function() error("boom") end)
            game:onnotify("tick", function() reached = true end)
            "#,
        )
        .unwrap();

    engine.notify(&Event::game("tick"));

    assert_eq!(eval(&engine, "return reached"), vec![HostValue::Bool(true)]);

    let errors = engine.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, "faulty");
    assert!(errors[0].message.contains("boom"));
    assert_eq!(host.reported_errors().len(), 1);
}

#[test]
fn test_listener_receives_host_arguments() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "args",
            r#"
            game:onnotify("scored", function(player, points, position)
                got = player .. ":" .. points .. ":" .. position.y
            end)
            "#,
        )
        .unwrap();

    engine.notify(&Event::game("scored").with_arguments(vec![
        HostValue::from("ana"),
        HostValue::Integer(5),
        HostValue::Vector(luiscript_runtime::Vector::new(1.0, 2.5, 3.0)),
    ]));

    assert_eq!(eval(&engine, "return got"), vec![HostValue::from("ana:5:2.5")]);
}

#[test]
fn test_events_broadcast_across_contexts() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "sender",
            r#"
            game:onnotify("go", function() game:notify("relay", 7) end)
            "#,
        )
        .unwrap();
    engine
        .load_code(
            "receiver",
            r#"game:onnotify("relay", function(n) game:sharedset("relayed", tostring(n)) end)"#,
        )
        .unwrap();

    engine.notify(&Event::game("go"));

    assert_eq!(engine.shared_get("relayed"), Some("7".to_string()));
}

#[test]
fn test_scheduler_with_manual_clock() {
    let clock = Rc::new(ManualClock::new());
    let (_host, engine) = create_engine();
    let mut engine = engine.with_clock(clock.clone());

    engine
        .load_code(
            "timers",
            r#"
            ticks, frames, timeouts = 0, 0, 0
            game:oninterval(function() ticks = ticks + 1 end, 100)
            game:onframe(function() frames = frames + 1 end)
            game:ontimeout(function() timeouts = timeouts + 1 end, 150)

            local cancelled = game:ontimeout(function() cancelled_ran = true end, 50)
            cancelled:clear()
            "#,
        )
        .unwrap();

    clock.advance(Duration::from_millis(100));
    engine.run_frame();
    clock.advance(Duration::from_millis(105));
    engine.run_frame();
    clock.advance(Duration::from_millis(95));
    engine.run_frame();
    engine.run_frame();

    assert_eq!(
        eval(&engine, "return ticks, frames, timeouts, cancelled_ran == nil"),
        vec![
            HostValue::Integer(3),
            HostValue::Integer(4),
            HostValue::Integer(1),
            HostValue::Bool(true),
        ]
    );
}

#[test]
fn test_task_endon_cancels_on_event() {
    let clock = Rc::new(ManualClock::new());
    let (_host, engine) = create_engine();
    let mut engine = engine.with_clock(clock.clone());

    engine
        .load_code(
            "endon",
            r#"
            runs = 0
            local menu = game:newmenu("hud")
            local task = game:oninterval(function() runs = runs + 1 end, 10)
            task:endon(menu, "close")
            "#,
        )
        .unwrap();

    clock.advance(Duration::from_millis(10));
    engine.run_frame();
    assert_eq!(engine.contexts()[0].task_count(), 1);

    engine.notify(&Event::new(
        luiscript_runtime::EntityRef::Menu("hud".to_string()),
        "close",
    ));
    assert_eq!(engine.contexts()[0].task_count(), 0);

    clock.advance(Duration::from_millis(50));
    engine.run_frame();
    assert_eq!(eval(&engine, "return runs"), vec![HostValue::Integer(1)]);
}

#[test]
fn test_converted_function_round_trip() {
    let (host, mut engine) = create_engine();
    engine
        .load_code(
            "callbacks",
            r#"
            local function add(a, b) return a + b, "sum" end
            luiglobals.callback = add
            same = luiglobals.callback == add
            luiglobals.failing = function() error("bad callback") end
            "#,
        )
        .unwrap();

    let globals = host.globals().unwrap();
    let Some(HostValue::Function(key)) = host.table_field(globals, "callback") else {
        panic!("callback was not stored as a host function");
    };
    assert!(host.is_closure(key));
    assert_eq!(eval(&engine, "return same"), vec![HostValue::Bool(true)]);

    let results = engine
        .invoke_converted(key, &[HostValue::Integer(2), HostValue::Integer(3)])
        .unwrap();
    assert_eq!(results, vec![HostValue::Integer(5), HostValue::from("sum")]);

    let Some(HostValue::Function(failing)) = host.table_field(globals, "failing") else {
        panic!("failing was not stored as a host function");
    };
    assert!(matches!(
        engine.invoke_converted(failing, &[]),
        Err(BridgeError::Script(_))
    ));
}

#[test]
fn test_freed_key_never_resolves() {
    let (host, mut engine) = create_engine();
    engine
        .load_code(
            "stale",
            r#"
            called = 0
            luiglobals.callback = function() called = called + 1 end
            "#,
        )
        .unwrap();

    let globals = host.globals().unwrap();
    let Some(HostValue::Function(key)) = host.table_field(globals, "callback") else {
        panic!("callback was not stored as a host function");
    };

    assert!(engine.on_host_free(key));
    assert!(!engine.on_host_free(key));
    assert!(matches!(
        engine.invoke_converted(key, &[]),
        Err(BridgeError::UnknownFunction(k)) if k == key
    ));
    assert_eq!(eval(&engine, "return called"), vec![HostValue::Integer(0)]);
}

#[test]
fn test_stop_purges_converted_functions() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code("owner", "luiglobals.callback = function() end")
        .unwrap();
    assert_eq!(engine.converted_count(), 1);

    engine.stop();
    assert_eq!(engine.converted_count(), 0);
}

#[test]
fn test_overlay_menu_follows_host() {
    let (host, mut engine) = create_engine();
    engine
        .load_code(
            "overlay",
            r#"
            local menu = game:newmenuoverlay("hud_overlay", "native_hud")
            before = menu:isopen()
            "#,
        )
        .unwrap();

    host.set_menu_open("native_hud", true);

    assert_eq!(
        eval(&engine, r#"return before, game:getmenu("hud_overlay"):isopen()"#),
        vec![HostValue::Bool(false), HostValue::Bool(true)]
    );
}

#[test]
fn test_menu_open_close_events() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "menus",
            r#"
            log = {}
            local menu = game:newmenu("options")
            menu:onnotify("open", function() table.insert(log, "open") end)
            menu:onnotify("close", function()
                table.insert(log, "close:" .. tostring(menu:isopen()))
            end)

            menu:open()
            menu:close()
            game:openmenu("options")
            game:closemenu("options")
            game:openmenu("missing")
            "#,
        )
        .unwrap();

    // menu:open() fires nothing, closing notifies while still open
    assert_eq!(
        eval(&engine, "return table.concat(log, ',')"),
        vec![HostValue::from("close:true,open,close:true")]
    );
}

#[test]
fn test_setdvar_rejects_bad_names() {
    let (host, mut engine) = create_engine();
    engine
        .load_code(
            "dvars",
            r#"
            local ok, err = pcall(function() game:setdvar("bad name", 1) end)
            rejected = not ok and string.find(tostring(err), "Invalid DVAR name 'bad name'", 1, true) ~= nil

            game:setdvar("cg_fov", 90)
            game:setdvar("r_scale", 0.5)
            game:setdvar("cl_flag", true)
            fov = game:getdvarint("cg_fov")
            "#,
        )
        .unwrap();

    assert_eq!(
        eval(&engine, "return rejected, fov"),
        vec![HostValue::Bool(true), HostValue::Integer(90)]
    );
    assert_eq!(host.dvar("cg_fov"), Some("90".to_string()));
    assert_eq!(host.dvar("r_scale"), Some("0.500000".to_string()));
    assert_eq!(host.dvar("cl_flag"), Some("1".to_string()));
    assert_eq!(host.dvar("bad name"), None);
}

#[test]
fn test_player_notify_needs_game() {
    let (host, mut engine) = create_engine();
    engine
        .load_code(
            "player",
            r#"
            function ping()
                return pcall(function() player:notify("menuresponse", "main", "play") end)
            end
            "#,
        )
        .unwrap();

    assert_eq!(eval(&engine, "return (ping())"), vec![HostValue::Bool(false)]);

    host.set_in_game(true);
    assert_eq!(eval(&engine, "return (ping())"), vec![HostValue::Bool(true)]);
    assert_eq!(
        host.player_notifies(),
        vec![(
            "menuresponse".to_string(),
            vec![HostValue::from("main"), HostValue::from("play")]
        )]
    );
}

#[test]
fn test_host_call_through() {
    let (host, mut engine) = create_engine();
    host.register_function("add", |args| match args {
        [HostValue::Integer(a), HostValue::Integer(b)] => Ok(vec![HostValue::Integer(a + b)]),
        _ => Ok(vec![]),
    });
    host.add_assets("material", &[("white", true), ("black", false)]);

    engine
        .load_code(
            "calls",
            r#"
            direct = game:call("add", 1, 2)
            sugar = game:add(3, 4)
            all = #game:assetlist("material")
            loaded = #game:assetlist("material", false)
            unknown = pcall(function() game:assetlist("sound") end)
            game:executecommand("quit")
            "#,
        )
        .unwrap();

    assert_eq!(
        eval(&engine, "return direct, sugar, all, loaded, unknown"),
        vec![
            HostValue::Integer(3),
            HostValue::Integer(7),
            HostValue::Integer(2),
            HostValue::Integer(1),
            HostValue::Bool(false),
        ]
    );
    assert_eq!(host.commands(), vec!["quit".to_string()]);
}

#[test]
fn test_host_proxies_defer_to_host() {
    let (host, mut engine) = create_engine();
    let widget = host.add_table([("label".to_string(), HostValue::from("Play"))]);
    let double = host.add_function(|args| match args {
        [HostValue::Integer(n)] => Ok(vec![HostValue::Integer(n * 2)]),
        _ => Ok(vec![]),
    });
    host.register_method("describe", |target, args| {
        Ok(vec![HostValue::from(format!("{}:{}", target.0, args.len()))])
    });
    host.set_global("Widget", HostValue::Userdata(widget));
    host.set_global("double", HostValue::Function(double));
    host.set_window_size(1280, 720);
    host.set_loaded_mod("mods/zombies");

    engine
        .load_code(
            "proxies",
            r#"
            local widget = luiglobals.Widget
            label = widget.label
            widget.label = "Quit"
            described = widget:describe(1, 2)
            doubled = luiglobals.double(21)
            local size = game:getwindowsize()
            width, height = size.x, size.y
            loaded = game:getloadedmod()
            "#,
        )
        .unwrap();

    assert_eq!(
        eval(&engine, "return label, described, doubled, width, height, loaded"),
        vec![
            HostValue::from("Play"),
            HostValue::from(format!("{}:2", widget.0)),
            HostValue::Integer(42),
            HostValue::Integer(1280),
            HostValue::Integer(720),
            HostValue::from("mods/zombies"),
        ]
    );
    assert_eq!(host.table_field(widget, "label"), Some(HostValue::from("Quit")));
}

#[test]
fn test_failing_timeout_runs_once() {
    let clock = Rc::new(ManualClock::new());
    let (_host, engine) = create_engine();
    let mut engine = engine.with_clock(clock.clone());

    engine
        .load_code(
            "timeouts",
            r#"
            runs = 0
            game:ontimeout(function()
                runs = runs + 1
                error("timeout failed")
            end, 10)
            "#,
        )
        .unwrap();

    clock.advance(Duration::from_millis(10));
    engine.run_frame();
    clock.advance(Duration::from_millis(10));
    engine.run_frame();

    assert_eq!(eval(&engine, "return runs"), vec![HostValue::Integer(1)]);
    assert_eq!(engine.contexts()[0].task_count(), 0);
    assert_eq!(engine.errors().len(), 1);
}

#[test]
fn test_failing_once_listener_is_removed() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "once",
            r#"
            heard = 0
            game:onnotifyonce("open", function()
                heard = heard + 1
                error("listener failed")
            end)
            "#,
        )
        .unwrap();

    engine.notify(&Event::game("open"));
    engine.notify(&Event::game("open"));

    assert_eq!(eval(&engine, "return heard"), vec![HostValue::Integer(1)]);
    assert_eq!(engine.contexts()[0].listener_count(), 0);
    assert_eq!(engine.errors().len(), 1);
}

#[test]
fn test_registrations_wait_for_next_dispatch() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "nested",
            r#"
            inner, late = 0, 0
            game:onframe(function()
                if not spawned then
                    spawned = true
                    game:onframe(function() inner = inner + 1 end)
                end
            end)
            game:onnotify("go", function()
                game:onnotify("go", function() late = late + 1 end)
            end)
            "#,
        )
        .unwrap();

    engine.run_frame();
    engine.notify(&Event::game("go"));
    assert_eq!(
        eval(&engine, "return inner, late"),
        vec![HostValue::Integer(0), HostValue::Integer(0)]
    );

    engine.run_frame();
    engine.notify(&Event::game("go"));
    assert_eq!(
        eval(&engine, "return inner, late"),
        vec![HostValue::Integer(1), HostValue::Integer(1)]
    );
}

#[test]
fn test_lookup_by_computed_float_id() {
    let (_host, mut engine) = create_engine();
    engine
        .load_code(
            "lookup",
            r#"
            local menu = game:newmenu("list")
            local row = element.new()
            row.id = 2 / 2
            menu:addchild(row)

            same = row.id == 1
            found_global = game:getelement(1, "id") == row
            found_child = menu:getelement(1, "id") == row
            count = #menu:getelements(1.0, "id")
            "#,
        )
        .unwrap();

    assert_eq!(
        eval(&engine, "return same, found_global, found_child, count"),
        vec![
            HostValue::Bool(true),
            HostValue::Bool(true),
            HostValue::Bool(true),
            HostValue::Integer(1),
        ]
    );
}

#[test]
fn test_table_accessors_shadow_fields() {
    let (host, mut engine) = create_engine();
    host.set_global("get", HostValue::from("shadowed"));

    engine
        .load_code(
            "accessors",
            r#"
            kind = type(luiglobals.get)
            value = luiglobals:get("get")
            "#,
        )
        .unwrap();

    assert_eq!(
        eval(&engine, "return kind, value"),
        vec![HostValue::from("function"), HostValue::from("shadowed")]
    );
}

struct StubHttp;

impl HttpClient for StubHttp {
    fn get(&self, url: &str) -> Result<String, HttpError> {
        if url.contains("ok") {
            Ok("payload".to_string())
        } else {
            Err(HttpError::Request("connection refused".to_string()))
        }
    }
}

#[test]
fn test_http_result_arrives_as_event() {
    let host = Rc::new(HeadlessHost::new());
    let mut engine = Engine::new(host, test_config())
        .with_http(Arc::new(StubHttp))
        .with_task_mode(TaskMode::Inline);

    engine
        .load_code(
            "http",
            r#"
            results = {}
            game:onnotify("http_request_done", function(id, ok, body)
                results[#results + 1] = { id = id, ok = ok, body = body }
            end)
            first = game:httpget("http://ok.invalid/")
            second = game:httpget("http://down.invalid/")
            "#,
        )
        .unwrap();

    // Nothing is delivered before the next frame
    assert_eq!(eval(&engine, "return #results"), vec![HostValue::Integer(0)]);

    engine.run_frame();

    assert_eq!(
        eval(
            &engine,
            "return first, second, results[1].id, results[1].ok, results[1].body, results[2].ok, results[2].body == nil"
        ),
        vec![
            HostValue::Integer(0),
            HostValue::Integer(1),
            HostValue::Integer(0),
            HostValue::Bool(true),
            HostValue::from("payload"),
            HostValue::Bool(false),
            HostValue::Bool(true),
        ]
    );
    assert_eq!(engine.pending_tasks(), 0);
}

#[test]
fn test_failed_blob_is_reported_not_kept() {
    let (host, mut engine) = create_engine();
    let result = engine.load_code("broken", "this is not lua");

    assert!(result.is_err());
    assert_eq!(engine.context_count(), 0);
    assert_eq!(engine.errors().len(), 1);
    assert_eq!(host.reported_errors().len(), 1);
}

use crate::core::errors::{BufferError, ServerError, WindowError};
use crate::core::input::xkb::keys::KEY_A;
use crate::core::input::{KeyState, MouseButton, TranslatedEvent, BTN_LEFT, BTN_RIGHT};
use crate::core::traits::WindowEvent;
use crate::core::window::{style, StyleMask, TitlebarButton, WindowId, WindowState};
use crate::tests::harness::TestServer;
use crate::util::geometry::Rect;

fn titled() -> StyleMask {
    StyleMask::TITLED | StyleMask::CLOSABLE | StyleMask::RESIZABLE
}

/// Left window, away from the initial pointer position.
const LEFT: Rect = Rect { x: 100, y: 100, width: 400, height: 300 };
/// Right window, under the initial pointer position (960, 540).
const RIGHT: Rect = Rect { x: 900, y: 400, width: 400, height: 300 };

fn inputs_for(events: &[(WindowId, WindowEvent)], window: WindowId) -> Vec<TranslatedEvent> {
    events
        .iter()
        .filter(|(id, _)| *id == window)
        .filter_map(|(_, e)| match e {
            WindowEvent::Input(input) => Some(input.clone()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Window lifecycle
// =============================================================================

#[test]
fn test_titled_window_frame_and_buttons() {
    let mut t = TestServer::new();
    let registry = t.server.registry_mut();
    let id = registry
        .create_window(Rect::new(0, 0, 800, 600), titled(), "Untitled")
        .unwrap();
    let record = registry.lookup(id).unwrap();

    let insets = style::insets(titled());
    assert_eq!(insets.top, 22);
    assert_eq!(record.frame(), Rect::new(0, 0, 800, 600).expand(insets));

    let bar = style::titlebar_rect(record.frame(), titled()).unwrap();
    let rects = record.buttons();
    let buttons: Vec<Rect> = [rects.close, rects.zoom, rects.miniaturize]
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    for (i, a) in buttons.iter().enumerate() {
        // Strictly inside: no shared edge with the strip.
        assert!(a.x > bar.x && a.y > bar.y);
        assert!(a.right() < bar.right() && a.bottom() < bar.bottom());
        assert!(!record.geometry().intersects(a));
        for b in &buttons[i + 1..] {
            assert!(!a.intersects(b));
        }
    }
}

#[test]
fn test_oversized_buffer_leaves_window_created() {
    let mut t = TestServer::new();
    let cap = t.server.registry().buffer_cap();
    let path = t.backing_file(16);
    let registry = t.server.registry_mut();
    let id = registry.create_window(LEFT, titled(), "big").unwrap();

    let err = registry.attach_buffer(id, &path, cap + 1).unwrap_err();
    assert!(matches!(err, ServerError::Buffer(BufferError::SizeExceeded { .. })));
    assert_eq!(registry.lookup(id).unwrap().state(), WindowState::Created);
    assert!(matches!(
        registry.mark_ready(id),
        Err(WindowError::InvalidTransition { state: WindowState::Created, .. })
    ));
}

#[test]
fn test_no_compositing_before_ready() {
    let mut t = TestServer::new();
    let path = t.backing_file(64);
    let registry = t.server.registry_mut();
    let id = registry.create_window(Rect::new(0, 0, 4, 4), titled(), "w").unwrap();
    registry.attach_buffer(id, &path, 64).unwrap();
    assert!(registry.frame_snapshot().iter().all(|r| r.id() != id));

    registry.mark_ready(id).unwrap();
    assert!(registry.frame_snapshot().iter().any(|r| r.id() == id));
}

#[test]
fn test_mark_ready_is_idempotent() {
    let mut t = TestServer::new();
    let id = t.ready_window(LEFT, titled());
    let registry = t.server.registry_mut();
    let seq = registry.lookup(id).unwrap().frame_seq();

    assert_eq!(registry.mark_ready(id), Ok(seq));
    let record = registry.lookup(id).unwrap();
    assert_eq!(record.state(), WindowState::Ready);
    assert_eq!(record.frame_seq(), seq);
}

#[test]
fn test_identities_never_reused_after_destroy() {
    let mut t = TestServer::new();
    let mut seen = Vec::new();
    for _ in 0..5 {
        let id = t.ready_window(Rect::new(0, 0, 2, 2), titled());
        t.server.destroy_window(id, &mut t.events).unwrap();
        seen.push(id);
    }
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert!(t.server.registry().is_empty());
}

#[test]
fn test_frames_shown_notifies_current_frames_only() {
    let mut t = TestServer::new();
    let a = t.ready_window(LEFT, titled());
    let b = t.ready_window(RIGHT, titled());
    let shown: Vec<(WindowId, u64)> = t
        .server
        .registry()
        .frame_snapshot()
        .iter()
        .map(|r| (r.id(), r.frame_seq()))
        .collect();

    // b attaches a new buffer before the frame is done.
    let path = t.backing_file(64);
    t.server.registry_mut().attach_buffer(b, &path, 64).unwrap();

    assert_eq!(t.server.frames_shown(&shown, &mut t.events), 1);
    assert_eq!(t.take_events(), vec![(a, WindowEvent::FramePresented { seq: 1 })]);
}

#[test]
fn test_shutdown_tears_down_everything() {
    let mut t = TestServer::new();
    let a = t.ready_window(LEFT, titled());
    t.ready_window(RIGHT, titled());
    let path = t.server.registry().lookup(a).unwrap().buffer().unwrap().path().to_path_buf();

    assert_eq!(t.server.shutdown(), 2);
    assert!(t.server.registry().is_empty());
    assert!(!path.exists());
    assert_eq!(t.server.focus().keyboard_focus(), None);
}

// =============================================================================
// Input routing
// =============================================================================

#[test]
fn test_triple_click_then_timeout() {
    let mut t = TestServer::new();
    let right = t.ready_window(RIGHT, titled());
    for time in [0, 100, 200, 1000] {
        t.click(time, BTN_LEFT);
    }
    t.tick();

    let counts: Vec<u32> = inputs_for(&t.take_events(), right)
        .into_iter()
        .filter_map(|e| match e {
            TranslatedEvent::PointerButton(b) if b.state == KeyState::Pressed => Some(b.click_count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 2, 3, 1]);
}

#[test]
fn test_click_focuses_and_keys_follow_focus() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let right = t.ready_window(RIGHT, titled());

    // Nobody has focus yet, so the key goes nowhere.
    t.input.key(0, KEY_A, KeyState::Pressed);
    t.input.key(5, KEY_A, KeyState::Released);
    t.tick();
    assert!(t.take_events().is_empty());
    assert_eq!(t.server.input().stats().rejected, 2);

    t.click(10, BTN_LEFT);
    t.tick();
    assert_eq!(t.server.focus().keyboard_focus(), Some(right));

    t.move_to(30, 300.0, 250.0);
    t.click(40, BTN_LEFT);
    t.input.key(60, KEY_A, KeyState::Pressed);
    t.tick();

    let events = t.take_events();
    assert!(events.contains(&(right, WindowEvent::FocusChanged { focused: false })));
    assert!(events.contains(&(left, WindowEvent::FocusChanged { focused: true })));
    let keys: Vec<String> = inputs_for(&events, left)
        .into_iter()
        .filter_map(|e| match e {
            TranslatedEvent::Key(k) => Some(k.text),
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec!["a".to_string()]);
    assert_eq!(t.server.registry().frame_snapshot()[0].id(), left);
}

#[test]
fn test_close_button_activates_on_release_over_it() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let close = t.server.registry().lookup(left).unwrap().buttons().close.unwrap();
    let (cx, cy) = (close.x as f64 + 5.0, close.y as f64 + 5.0);

    t.move_to(0, cx, cy);
    t.take_events();
    t.click(10, BTN_LEFT);
    t.tick();
    assert_eq!(
        t.take_events(),
        vec![
            (left, WindowEvent::FocusChanged { focused: true }),
            (left, WindowEvent::ButtonActivated(TitlebarButton::Close)),
        ]
    );

    // Press on the button, release over the content: no activation.
    t.input.button(100, BTN_LEFT, KeyState::Pressed);
    t.move_to(110, 300.0, 250.0);
    t.input.button(120, BTN_LEFT, KeyState::Released);
    t.tick();
    let events = t.take_events();
    assert!(events.iter().all(|(_, e)| !matches!(e, WindowEvent::ButtonActivated(_))));
    assert!(inputs_for(&events, left)
        .iter()
        .all(|e| !matches!(e, TranslatedEvent::PointerButton(_))));
}

#[test]
fn test_other_button_does_not_resolve_armed_titlebar_button() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let close = t.server.registry().lookup(left).unwrap().buttons().close.unwrap();
    t.move_to(0, close.x as f64 + 5.0, close.y as f64 + 5.0);
    t.take_events();

    t.input.button(10, BTN_LEFT, KeyState::Pressed);
    t.click(20, BTN_RIGHT);
    t.tick();
    let events = t.take_events();
    assert!(events.iter().all(|(_, e)| !matches!(e, WindowEvent::ButtonActivated(_))));
    let buttons: Vec<(MouseButton, KeyState)> = inputs_for(&events, left)
        .into_iter()
        .filter_map(|e| match e {
            TranslatedEvent::PointerButton(b) => Some((b.button, b.state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        buttons,
        vec![(MouseButton::Right, KeyState::Pressed), (MouseButton::Right, KeyState::Released)]
    );

    // The left release still resolves the press that armed the button.
    t.input.button(40, BTN_LEFT, KeyState::Released);
    t.tick();
    assert_eq!(
        t.take_events(),
        vec![(left, WindowEvent::ButtonActivated(TitlebarButton::Close))]
    );
}

#[test]
fn test_disabled_titlebar_button_never_activates() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let record = t.server.registry().lookup(left).unwrap();
    assert!(!record.buttons().is_enabled(TitlebarButton::Miniaturize));
    let mini = record.buttons().miniaturize.unwrap();

    t.move_to(0, mini.x as f64 + 5.0, mini.y as f64 + 5.0);
    t.take_events();
    t.click(10, BTN_LEFT);
    t.tick();
    let events = t.take_events();
    assert!(events.iter().all(|(_, e)| !matches!(e, WindowEvent::ButtonActivated(_))));
    assert!(inputs_for(&events, left).is_empty());
}

#[test]
fn test_implicit_grab_keeps_pointer_events() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let right = t.ready_window(RIGHT, titled());

    t.input.button(0, BTN_LEFT, KeyState::Pressed);
    t.move_to(10, 300.0, 250.0);
    t.input.button(20, BTN_LEFT, KeyState::Released);
    t.tick();
    let events = t.take_events();
    assert_eq!(inputs_for(&events, right).len(), 3);
    assert!(inputs_for(&events, left).is_empty());

    t.move_to(30, 310.0, 250.0);
    assert_eq!(inputs_for(&t.take_events(), left).len(), 1);
}

#[test]
fn test_destroying_focused_window_refocuses_previous() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let right = t.ready_window(RIGHT, titled());

    t.move_to(0, 300.0, 250.0);
    t.click(10, BTN_LEFT);
    t.move_to(30, 960.0, 540.0);
    t.click(40, BTN_LEFT);
    t.tick();
    assert_eq!(t.server.focus().keyboard_focus(), Some(right));
    t.take_events();

    t.server.destroy_window(right, &mut t.events).unwrap();
    assert_eq!(
        t.take_events(),
        vec![
            (right, WindowEvent::Destroyed),
            (left, WindowEvent::FocusChanged { focused: true }),
        ]
    );
    assert_eq!(t.server.focus().keyboard_focus(), Some(left));
    assert_eq!(
        t.server.destroy_window(right, &mut t.events),
        Err(WindowError::UnknownWindow(right))
    );
}

#[test]
fn test_reaped_window_is_destroyed_like_a_closed_one() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    let size = (RIGHT.width * RIGHT.height * 4) as usize;
    let path = t.backing_file(size);
    let registry = t.server.registry_mut();
    let record = registry.new_record(RIGHT, titled(), "orphan").unwrap();
    // Above the kernel's pid_max, so no such process.
    let right = registry.register(record.with_owner(i32::MAX)).unwrap();
    registry.attach_buffer(right, &path, size).unwrap();
    registry.mark_ready(right).unwrap();

    t.move_to(0, 300.0, 250.0);
    t.click(10, BTN_LEFT);
    t.move_to(30, 960.0, 540.0);
    t.click(40, BTN_LEFT);
    t.tick();
    assert_eq!(t.server.focus().keyboard_focus(), Some(right));
    t.take_events();

    assert_eq!(t.server.reap_dead_clients(&mut t.events), vec![right]);
    assert_eq!(
        t.take_events(),
        vec![
            (right, WindowEvent::Destroyed),
            (left, WindowEvent::FocusChanged { focused: true }),
        ]
    );
    assert!(!path.exists());
}

#[test]
fn test_key_repeat_goes_to_focused_window() {
    let mut t = TestServer::new();
    let right = t.ready_window(RIGHT, titled());
    t.click(0, BTN_LEFT);
    t.input.key(100, KEY_A, KeyState::Pressed);
    t.tick();
    t.take_events();

    assert_eq!(t.server.dispatch_repeats(600, &mut t.events), 1);
    match t.take_events().as_slice() {
        [(id, WindowEvent::Input(TranslatedEvent::Key(k)))] => {
            assert_eq!(*id, right);
            assert!(k.is_repeat);
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn test_screen_change_updates_clamp_and_usable_area() {
    let mut t = TestServer::new();
    let panel = t.ready_window(Rect::new(0, 0, 800, 30), StyleMask::BORDERLESS);
    t.server
        .registry_mut()
        .lookup_mut(panel)
        .unwrap()
        .set_property(crate::core::window::WindowProperty::ReservedZone(
            crate::util::geometry::Insets::new(30, 0, 0, 0),
        ))
        .unwrap();

    t.server.set_screen_geometry(Rect::new(0, 0, 800, 600));
    assert_eq!(t.server.usable_area(), Rect::new(0, 30, 800, 570));

    t.input.motion(0, 5000.0, 5000.0);
    t.tick();
    assert_eq!(t.pointer(), crate::util::geometry::Point::new(799.0, 599.0));
}

#[test]
fn test_activate_raises_and_focuses() {
    let mut t = TestServer::new();
    let left = t.ready_window(LEFT, titled());
    t.ready_window(RIGHT, titled());

    t.server.activate(left, &mut t.events).unwrap();
    assert_eq!(t.take_events(), vec![(left, WindowEvent::FocusChanged { focused: true })]);
    assert_eq!(t.server.registry().frame_snapshot()[0].id(), left);

    let missing = WindowId::from_raw(999);
    assert_eq!(
        t.server.activate(missing, &mut t.events),
        Err(WindowError::UnknownWindow(missing))
    );
}

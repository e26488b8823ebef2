//! Scripted walkthrough of the responsive shell.
//!
//! Builds the two-column scaffold, then prints the document outline after
//! each stage: desktop start, mobile mount, main pane reveal, deep link,
//! and desktop restoration.
//!
//! Run with `cargo run --example responsive_walkthrough`.

use std::sync::Arc;

use astra_shell::{
    Document, EntityOpenDetail, HomeRoute, NavItem, NavSections, NavSnapshot, RenderResult,
    ShellAnchors, ShellEvent, ShellResult, ShellRuntime, ShellSeams, SlotRegistry, Store,
    ViewSpec, shared_document,
};

fn main() -> ShellResult<()> {
    let mut doc = Document::new();
    let body = doc.body();
    let wrapper = doc.build_element("div").dom_id("app-wrapper").child_of(body)?;
    let sidebar = doc.build_element("div").dom_id("app-sidebar").child_of(wrapper)?;
    let desktop_rail = doc
        .build_element("nav")
        .dom_id("app-desktop-rail")
        .child_of(sidebar)?;
    let content = doc.build_element("div").dom_id("app-content").child_of(wrapper)?;

    let document = shared_document(doc);
    let nav = Store::new(NavSnapshot {
        active_tab: "home".to_string(),
        sections: NavSections {
            top: vec![NavItem::titled("home", "Home")],
            middle: vec![
                NavItem::titled("user-settings", "Settings"),
                NavItem::titled("persona", "Persona"),
            ],
            bottom: vec![NavItem::titled("chat", "Chat")],
        },
    });
    let route = Store::new(HomeRoute::default());

    let seams = ShellSeams::new(
        Arc::clone(&document),
        ShellAnchors {
            wrapper,
            sidebar,
            content,
            desktop_rail,
        },
        nav,
        route.clone(),
    );
    let mut runtime = ShellRuntime::new(seams)?;

    // A slot-hosted panel that renders differently per viewport class.
    let registry = SlotRegistry::new("main", content);
    {
        let mut doc = document.lock().expect("document");
        registry.register_view(
            &mut doc,
            ViewSpec::new("entity-panel", |ctx| {
                let tag = if ctx.is_mobile { "section" } else { "article" };
                let node = ctx
                    .document
                    .build_element(tag)
                    .dom_id("entity-panel")
                    .text("entity details")
                    .finish();
                Ok(RenderResult::Node(node))
            })
            .auto_activate(true),
        );
    }
    runtime.attach_slot_registry(registry);

    runtime.initialize_layout(1280);
    print_stage(&runtime, "desktop start (1280px)");

    runtime.handle_event(ShellEvent::Viewport { width: 480 });
    print_stage(&runtime, "mobile mount (480px): sidebar in front");

    runtime.handle_event(ShellEvent::ShowMain);
    print_stage(&runtime, "main pane revealed");

    runtime.handle_event(ShellEvent::HideMain);
    runtime.handle_event(ShellEvent::EntityOpen(EntityOpenDetail {
        tab_id: "home".to_string(),
        entity_type: Some("character".to_string()),
        entity_key: Some("aria-7".to_string()),
        ..EntityOpenDetail::default()
    }));
    print_stage(&runtime, "deep link forces main pane visible");

    runtime.handle_event(ShellEvent::Viewport { width: 1400 });
    print_stage(&runtime, "desktop restored (1400px)");

    runtime.teardown();
    Ok(())
}

fn print_stage(runtime: &ShellRuntime, label: &str) {
    let document = runtime.document();
    let doc = document.lock().expect("document");
    println!("== {label} [{:?}]", runtime.state());
    println!("{}", doc.snapshot(doc.body()));
    println!();
}

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use anyhow::bail;
use parkscript_core::{HookEvent, HookType, PluginId};
use parkscript_system_events::{EventHub, Subscription};

#[test]
fn tick_counter_stops_after_mid_run_dispose() {
    let hub = EventHub::new();
    let ticks = Rc::new(Cell::new(0_u32));
    let counter = ticks.clone();
    let token = hub.subscribe(HookType::IntervalTick, Some(PluginId::new(1)), move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    for tick in 1..=10 {
        let _ = hub.publish(&HookEvent::Tick);
        if tick == 5 {
            token.dispose();
        }
    }

    assert_eq!(ticks.get(), 5, "disposed handler must not observe later ticks");
}

#[test]
fn failing_handlers_do_not_stop_delivery() {
    let hub = EventHub::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    let _first = hub.subscribe(HookType::IntervalDay, None, move |_| {
        log.borrow_mut().push("first");
        bail!("first handler rejects the day")
    });
    let _second = hub.subscribe(HookType::IntervalDay, None, |_| panic!("second handler panics"));
    let log = order.clone();
    let _third = hub.subscribe(HookType::IntervalDay, None, move |_| {
        log.borrow_mut().push("third");
        Ok(())
    });

    assert_eq!(hub.publish(&HookEvent::Day), 3);
    assert_eq!(hub.publish(&HookEvent::Day), 3);
    assert_eq!(*order.borrow(), vec!["first", "third", "first", "third"]);
}

#[test]
fn handler_can_dispose_itself_during_delivery() {
    let hub = EventHub::new();
    let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    let calls = Rc::new(Cell::new(0));

    let own_token = slot.clone();
    let counter = calls.clone();
    let token = hub.subscribe(HookType::IntervalTick, None, move |_| {
        counter.set(counter.get() + 1);
        if let Some(token) = own_token.borrow().as_ref() {
            token.dispose();
        }
        Ok(())
    });
    *slot.borrow_mut() = Some(token);

    let _ = hub.publish(&HookEvent::Tick);
    let _ = hub.publish(&HookEvent::Tick);

    assert_eq!(calls.get(), 1);
    assert_eq!(hub.subscriber_count(HookType::IntervalTick), 0);
}

#[test]
fn subscriptions_added_during_delivery_start_with_the_next_event() {
    let hub = EventHub::new();
    let late_calls = Rc::new(Cell::new(0));

    let registrar = hub.clone();
    let counter = late_calls.clone();
    let _outer = hub.subscribe(HookType::NetworkChat, None, move |_| {
        let counter = counter.clone();
        let _ = registrar.subscribe(HookType::NetworkChat, None, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        Ok(())
    });

    let chat = HookEvent::Chat {
        player: parkscript_core::PlayerId::new(0),
        message: "hello".to_owned(),
    };
    assert_eq!(hub.publish(&chat), 1);
    assert_eq!(late_calls.get(), 0);
    assert_eq!(hub.publish(&chat), 2);
    assert_eq!(late_calls.get(), 1);
}

#[test]
fn unloading_a_plugin_disposes_all_of_its_subscriptions() {
    let hub = EventHub::new();
    let plugin = PluginId::new(7);
    let tick = hub.subscribe(HookType::IntervalTick, Some(plugin), |_| Ok(()));
    let _day = hub.subscribe(HookType::IntervalDay, Some(plugin), |_| Ok(()));
    let _other = hub.subscribe(HookType::IntervalDay, Some(PluginId::new(8)), |_| Ok(()));

    assert_eq!(hub.dispose_plugin(plugin), 2);
    assert!(!tick.is_active());
    tick.dispose();
    assert_eq!(hub.subscriber_count(HookType::IntervalDay), 1);
}

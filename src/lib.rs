pub mod config;
pub mod roster;
pub mod selector;
pub mod session;
pub mod storage;

use config::PickerConfig;
use gloo_timers::callback::Timeout;
use log::info;
use roster::{fetch_roster, Roster};
use selector::segment_degrees;
use session::{PairingContext, Session, SpinKind};
use storage::{LocalStorageStore, PairingStore, Partnership};
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

const WHEEL_COLORS: [&str; 8] = [
    "#8B5CF6", "#F97316", "#10B981", "#F59E0B", "#3B82F6", "#EC4899", "#EF4444", "#6366F1",
];

type AppContext = PairingContext<LocalStorageStore>;

#[derive(PartialEq, Clone, Copy)]
enum FetchStatus {
    Idle,
    Loading,
}

fn load_context(config: &PickerConfig, roster: Roster) -> AppContext {
    PairingContext::load(
        roster,
        PairingStore::new(LocalStorageStore, &config.storage_key),
    )
}

#[function_component(App)]
fn app() -> Html {
    let config = use_memo(|_| PickerConfig::default(), ());
    let roster_status = use_state(|| FetchStatus::Loading);
    let context = {
        let config = config.clone();
        use_mut_ref(move || load_context(&config, Roster::default()))
    };
    let session = use_mut_ref(Session::new);
    let force_update = use_force_update();

    let name_input = use_state(String::new);
    let login_error = use_state(|| None::<String>);
    let notice = use_state(|| None::<String>);
    let rotation = use_state(|| 0.0_f64);
    let spinning = use_state(|| false);
    let wheel_names = use_state(|| None::<Vec<String>>);

    {
        let config = config.clone();
        let context = context.clone();
        let roster_status = roster_status.clone();

        use_effect_with_deps(
            move |_| {
                spawn_local(async move {
                    let roster = fetch_roster(&config.roster_url).await;
                    *context.borrow_mut() = load_context(&config, roster);
                    roster_status.set(FetchStatus::Idle);
                });
                || ()
            },
            (),
        );
    }

    let on_name_input = {
        let name_input = name_input.clone();
        Callback::from(move |event: InputEvent| {
            let input: HtmlInputElement = event.target_unchecked_into();
            name_input.set(input.value());
        })
    };

    let on_submit_name = {
        let context = context.clone();
        let session = session.clone();
        let name_input = name_input.clone();
        let login_error = login_error.clone();
        let notice = notice.clone();

        Callback::from(move |_: ()| {
            if name_input.trim().is_empty() {
                login_error.set(Some("Please enter your name".to_owned()));
                return;
            }
            let result = {
                let mut ctx = context.borrow_mut();
                session.borrow_mut().submit_name(&mut *ctx, &name_input)
            };
            match result {
                Ok(name) => {
                    login_error.set(None);
                    name_input.set(String::new());
                    notice.set(Some(format!("Welcome {name}! Let's find you a partner.")));
                }
                Err(err) => {
                    info!("Rejected login: {}", err);
                    login_error.set(Some("Please enter one of the registered names".to_owned()));
                }
            }
        })
    };

    let on_spin = {
        let config = config.clone();
        let context = context.clone();
        let session = session.clone();
        let rotation = rotation.clone();
        let spinning = spinning.clone();
        let wheel_names = wheel_names.clone();
        let notice = notice.clone();
        let force_update = force_update.clone();

        Callback::from(move |_: MouseEvent| {
            if *spinning {
                return;
            }
            let mut rng = rand::thread_rng();
            let result = {
                let mut ctx = context.borrow_mut();
                session.borrow_mut().spin_wheel(
                    &mut *ctx,
                    *rotation,
                    config.spin_turns.clone(),
                    &mut rng,
                )
            };
            let result = match result {
                Ok(result) => result,
                Err(err) => {
                    notice.set(Some(err.to_string()));
                    return;
                }
            };

            let outcome = result.outcome;
            let headline = match outcome.kind {
                SpinKind::Created => "Partnership created!",
                SpinKind::Revealed => "Partner revealed!",
            };
            let message = match outcome.persist_error {
                Some(err) => format!(
                    "{headline} You've been matched with {} ({err}).",
                    outcome.partner
                ),
                None => format!("{headline} You've been matched with {}!", outcome.partner),
            };

            rotation.set(result.spin.rotation_degrees);
            wheel_names.set(Some(result.names));
            spinning.set(true);

            let spinning = spinning.clone();
            let wheel_names = wheel_names.clone();
            let notice = notice.clone();
            let force_update = force_update.clone();
            Timeout::new(config.spin_duration_ms, move || {
                notice.set(Some(message));
                wheel_names.set(None);
                spinning.set(false);
                force_update.force_update();
            })
            .forget();
        })
    };

    let on_new_week = {
        let context = context.clone();
        let session = session.clone();
        let notice = notice.clone();
        let force_update = force_update.clone();

        Callback::from(move |_: MouseEvent| {
            let ctx = context.borrow();
            if session.borrow_mut().start_new_week(&*ctx).is_ok() {
                notice.set(Some("Time to find a new partner for this week.".to_owned()));
                force_update.force_update();
            }
        })
    };

    let on_switch_user = {
        let session = session.clone();
        let notice = notice.clone();
        let rotation = rotation.clone();
        let force_update = force_update.clone();
        let spinning = spinning.clone();

        Callback::from(move |_: MouseEvent| {
            if *spinning {
                return;
            }
            session.borrow_mut().reset();
            notice.set(None);
            rotation.set(0.0);
            force_update.force_update();
        })
    };

    let ctx = context.borrow();
    let session_ref = session.borrow();

    let body = match (*roster_status, session_ref.active_user()) {
        (FetchStatus::Loading, _) => html! { <p class="placeholder">{ "Loading roster…" }</p> },
        (FetchStatus::Idle, None) => render_name_entry(
            ctx.roster(),
            &name_input,
            (*login_error).clone(),
            on_name_input,
            on_submit_name,
        ),
        (FetchStatus::Idle, Some(user)) => {
            let candidates = session_ref.available_partners(&*ctx).unwrap_or_default();
            let status_panel = match (&*wheel_names, session_ref.displayed_partner()) {
                (Some(names), _) => render_wheel_panel(names, *rotation, true, &config, on_spin),
                (None, Some(partner)) => render_current_partner(
                    partner,
                    session_ref.active_week().unwrap_or(1),
                    candidates.is_empty(),
                    on_new_week,
                ),
                (None, None) => {
                    render_wheel_panel(&candidates, *rotation, *spinning, &config, on_spin)
                }
            };

            html! {
                <div class="picker">
                    <header class="picker-header">
                        <h1>{ "Partner Picker" }</h1>
                        <p>{ "Welcome back, " }<strong>{ user }</strong>{ "!" }</p>
                        <button class="outline" onclick={on_switch_user} disabled={*spinning}>{ "Switch User" }</button>
                    </header>
                    <div class="columns">
                        <section class="column">{ status_panel }</section>
                        <section class="column">{ render_history(session_ref.history(&*ctx)) }</section>
                    </div>
                </div>
            }
        }
    };

    html! {
        <main class="app-container">
            {
                if let Some(message) = &*notice {
                    html! { <div class="notice">{ message }</div> }
                } else {
                    html! {}
                }
            }
            { body }
        </main>
    }
}

fn render_name_entry(
    roster: &Roster,
    name_input: &UseStateHandle<String>,
    error: Option<String>,
    on_input: Callback<InputEvent>,
    on_submit: Callback<()>,
) -> Html {
    let on_keypress = {
        let on_submit = on_submit.clone();
        Callback::from(move |event: KeyboardEvent| {
            if event.key() == "Enter" {
                on_submit.emit(());
            }
        })
    };
    let on_click = Callback::from(move |_: MouseEvent| on_submit.emit(()));

    html! {
        <div class="card name-entry">
            <h1>{ "Partner Picker" }</h1>
            <p class="muted">{ "Enter your name to find your partner for the week" }</p>
            <input
                placeholder="Enter your name..."
                value={(**name_input).clone()}
                oninput={on_input}
                onkeypress={on_keypress}
            />
            <button onclick={on_click}>{ "Continue" }</button>
            {
                if let Some(message) = error {
                    html! { <p class="error">{ message }</p> }
                } else {
                    html! {}
                }
            }
            <div class="roster">
                <p class="muted">{ "Valid names:" }</p>
                <div class="roster-grid">
                    { for roster.names().iter().map(|name| html! { <span key={name.clone()}>{ name }</span> }) }
                </div>
            </div>
        </div>
    }
}

fn render_current_partner(
    partner: &str,
    week: u32,
    exhausted: bool,
    on_new_week: Callback<MouseEvent>,
) -> Html {
    html! {
        <div class="card current-partner">
            <h2>{ "Current Partner" }</h2>
            <div class="partner-banner">
                <h3>{ partner }</h3>
                <p>{ format!("Week {week} Partner") }</p>
            </div>
            <button onclick={on_new_week} disabled={exhausted}>
                { if exhausted { "No More Partners Available" } else { "Start New Week" } }
            </button>
            {
                if exhausted {
                    html! { <p class="muted">{ "You've been partnered with everyone!" }</p> }
                } else {
                    html! {}
                }
            }
        </div>
    }
}

fn render_wheel_panel(
    candidates: &[String],
    rotation: f64,
    spinning: bool,
    config: &PickerConfig,
    on_spin: Callback<MouseEvent>,
) -> Html {
    if candidates.is_empty() {
        return html! {
            <div class="card">
                <h2>{ "All Done!" }</h2>
                <p class="muted">{ "You've been partnered with everyone available." }</p>
            </div>
        };
    }

    let segment = segment_degrees(candidates.len());
    let gradient = candidates
        .iter()
        .enumerate()
        .map(|(index, _)| {
            let color = WHEEL_COLORS[index % WHEEL_COLORS.len()];
            format!(
                "{color} {:.3}deg {:.3}deg",
                index as f64 * segment,
                (index + 1) as f64 * segment
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let transition = if spinning {
        format!(
            "transform {}ms cubic-bezier(0.25, 0.46, 0.45, 0.94)",
            config.spin_duration_ms
        )
    } else {
        "none".to_owned()
    };
    let wheel_style = format!(
        "background: conic-gradient({gradient}); transform: rotate({rotation:.3}deg); transition: {transition};"
    );

    html! {
        <div class="card wheel-panel">
            <h2>{ "Find Your Partner" }</h2>
            <div class="wheel-frame">
                <div class="wheel-pointer"></div>
                <div class="wheel" style={wheel_style}>
                    { for candidates.iter().enumerate().map(|(index, name)| {
                        let angle = (index as f64 + 0.5) * segment;
                        html! {
                            <span key={name.clone()} class="wheel-label"
                                style={format!("transform: rotate({angle:.3}deg) translateY(-110px);")}>
                                { name }
                            </span>
                        }
                    }) }
                </div>
            </div>
            <button onclick={on_spin} disabled={spinning}>
                { if spinning { "Spinning..." } else { "Spin the Wheel!" } }
            </button>
        </div>
    }
}

fn render_history(partnerships: &[Partnership]) -> Html {
    if partnerships.is_empty() {
        return html! {
            <div class="card history">
                <h2>{ "Partnership History" }</h2>
                <p class="muted">{ "No partnerships yet. Spin the wheel to find your first partner!" }</p>
            </div>
        };
    }

    html! {
        <div class="card history">
            <h2>{ "Partnership History" }</h2>
            <ul>
                { for partnerships.iter().map(|p| {
                    let partner = if p.confirmed { p.partner.clone() } else { "Spin to reveal".to_owned() };
                    html! {
                        <li key={format!("{}-{}", p.week, p.partner)}>
                            <span class="badge">{ format!("Week {}", p.week) }</span>
                            <span class="partner-name">{ partner }</span>
                        </li>
                    }
                }) }
            </ul>
        </div>
    }
}

#[wasm_bindgen(start)]
pub fn run_app() {
    wasm_logger::init(wasm_logger::Config::default());
    yew::Renderer::<App>::new().render();
}

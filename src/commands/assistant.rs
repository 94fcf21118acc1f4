//! LLM-backed commands.
//!
//! `ask` handles a single utterance; `run` is the interactive loop. Both
//! need `TOGETHER_API_KEY` (or `llm.api_key`) and fail at startup without it.
//!
//! The run loop owns the foreground: it listens on the transcriber, handles
//! utterances, and takes a proactive turn after a quiet spell. Reminder
//! checks run on a tokio runtime in the background and share the store
//! through a mutex, so a check never interleaves with a turn.

use super::open_store;
use murmur::assistant::{Assistant, Reply, render};
use murmur::llm::{LlmProvider, TogetherClient};
use murmur::models::time::local_now;
use murmur::services::run_scheduler;
use murmur::speech::{
    ConsoleNotifier, LineTranscriber, Notifier, SpeechSynthesizer, SpeechToText, build_synthesizer,
};
use murmur::storage::MemoryBackend;
use murmur::{MemoryStore, MurmurConfig};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

/// Prints notifications and speaks their message.
struct AnnouncingNotifier {
    console: ConsoleNotifier,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Notifier for AnnouncingNotifier {
    fn notify(&self, title: &str, message: &str) -> murmur::Result<()> {
        self.console.notify(title, message)?;
        self.synthesizer.speak(message)
    }
}

fn speak(synthesizer: &dyn SpeechSynthesizer, text: &str) {
    if let Err(e) = synthesizer.speak(text) {
        warn!(error = %e, synthesizer = synthesizer.name(), "Speech failed");
    }
}

fn deliver(reply: &Reply, synthesizer: &dyn SpeechSynthesizer, notifier: &dyn Notifier) {
    speak(synthesizer, &reply.text);
    if let Some(notification) = &reply.notification {
        if let Err(e) = notifier.notify(&notification.title, &notification.message) {
            warn!(error = %e, "Notification failed");
        }
    }
}

fn build_llm(config: &MurmurConfig) -> Result<Arc<dyn LlmProvider>, Box<dyn Error>> {
    config.require_api_key()?;
    Ok(Arc::new(TogetherClient::from_config(&config.llm)))
}

/// Sends one utterance to the assistant.
pub fn cmd_ask(config: &MurmurConfig, utterance: String) -> Result<(), Box<dyn Error>> {
    let llm = build_llm(config)?;
    let synthesizer = build_synthesizer(&config.speech);
    let notifier = ConsoleNotifier::new();
    let mut store = open_store(config)?;
    let mut assistant = Assistant::new(llm);

    let reply = assistant.handle(&mut store, &utterance, local_now())?;
    deliver(&reply, synthesizer.as_ref(), &notifier);
    if reply.awaiting_confirmation {
        eprintln!("(Answer follow-up questions in `murmur run`.)");
    }
    store.close()?;
    Ok(())
}

/// Runs the interactive assistant until input ends or `:quit`.
pub fn cmd_run(config: &MurmurConfig, with_scheduler: bool) -> Result<(), Box<dyn Error>> {
    let llm = build_llm(config)?;
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::from(build_synthesizer(&config.speech));
    let notifier: Arc<dyn Notifier> = Arc::new(AnnouncingNotifier {
        console: ConsoleNotifier::new(),
        synthesizer: Arc::clone(&synthesizer),
    });
    let store = Arc::new(Mutex::new(open_store(config)?));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = with_scheduler.then(|| {
        runtime.spawn(run_scheduler(
            Arc::clone(&store),
            Arc::clone(&notifier),
            config.scheduler,
            shutdown_rx,
        ))
    });

    println!("Murmur is listening. Type to talk; :intent, :week, :memories, or :quit.");
    let result = conversation_loop(
        config,
        &mut LineTranscriber::stdin(),
        &store,
        Assistant::new(llm),
        synthesizer.as_ref(),
        notifier.as_ref(),
    );

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(e) = runtime.block_on(handle) {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }
    drop(runtime);

    let store = Arc::try_unwrap(store)
        .map_err(|_| "memory store is still shared")?
        .into_inner();
    store.close()?;
    result
}

/// Listens and answers until the transcriber closes or the user quits.
///
/// A silent turn only reads the store; the assistant is consulted for
/// utterances alone.
fn conversation_loop<B: MemoryBackend>(
    config: &MurmurConfig,
    transcriber: &mut dyn SpeechToText,
    store: &Mutex<MemoryStore<B>>,
    mut assistant: Assistant,
    synthesizer: &dyn SpeechSynthesizer,
    notifier: &dyn Notifier,
) -> Result<(), Box<dyn Error>> {
    let listen_timeout = Duration::from_secs(config.speech.listen_timeout_secs.max(1));
    let idle_after = config.scheduler.idle_turn();
    let mut last_interaction = local_now();

    loop {
        let heard = transcriber.listen(listen_timeout).unwrap_or_else(|e| {
            warn!(error = %e, transcriber = transcriber.name(), "Listening failed");
            None
        });
        let now = local_now();

        let Some(line) = heard else {
            if transcriber.is_closed() {
                info!("Input closed");
                return Ok(());
            }
            if now.signed_duration_since(last_interaction) >= idle_after {
                let message = render::proactive_message(store.blocking_lock().memory(), now);
                speak(synthesizer, &message);
                last_interaction = now;
            }
            continue;
        };
        last_interaction = now;

        match line.as_str() {
            ":quit" | ":exit" => return Ok(()),
            ":listen" => println!("Listening..."),
            ":intent" => println!("{}", render::intent_display(store.blocking_lock().memory(), now)),
            ":week" => {
                println!("{}", render::weekly_calendar(&store.blocking_lock().weekly_view(now)));
            },
            ":memories" => {
                let guard = store.blocking_lock();
                println!("{}", render::relevant_memories(guard.context()));
                println!("Memory context: {}", render::memory_summary(guard.memory(), now));
            },
            utterance => {
                let result = {
                    let mut guard = store.blocking_lock();
                    assistant.handle(&mut *guard, utterance, now)
                };
                match result {
                    Ok(reply) => deliver(&reply, synthesizer, notifier),
                    Err(e) if e.is_storage() => {
                        eprintln!("Error: {e}");
                        speak(synthesizer, "I couldn't save that to memory.");
                    },
                    Err(e) => eprintln!("Error: {e}"),
                }
            },
        }
    }
}

use log::error;
use std::panic;

/// Pretty backtraces on panic, with the panic message also sent to the log
/// file since the console output of a headless run is often discarded.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}

//! Helpers for wiring modules to hand-held pipe ends

use textpipe::pipeline::{
    open_pipe, AnyReceiver, AnySender, CancelToken, Module, PipeId, PipeKind, PipeReceiver,
    PipeSender, PipeSettings,
};

/// Open a byte pipe and bind its consumer end to `module.port`.
pub fn feed_input(module: &mut dyn Module, port: &str, id: u32) -> PipeSender<Vec<u8>> {
    let name = module.name().to_string();
    let (tx, rx) = open_pipe(PipeId(id), PipeKind::Bytes, PipeSettings::default(), CancelToken::new());
    module
        .ports_mut()
        .input_mut(port)
        .expect("input port exists")
        .bind(&name, rx)
        .expect("input port binds");
    match tx {
        AnySender::Bytes(tx) => tx,
        AnySender::Chars(_) => unreachable!("opened a byte pipe"),
    }
}

/// Open a character pipe from `module.port` and return its consumer end.
pub fn tap_output(module: &mut dyn Module, port: &str, id: u32) -> PipeReceiver<String> {
    let name = module.name().to_string();
    let (tx, rx) = open_pipe(PipeId(id), PipeKind::Chars, PipeSettings::default(), CancelToken::new());
    module
        .ports_mut()
        .output_mut(port)
        .expect("output port exists")
        .attach(&name, tx)
        .expect("output port attaches");
    match rx {
        AnyReceiver::Chars(rx) => rx,
        AnyReceiver::Bytes(_) => unreachable!("opened a char pipe"),
    }
}

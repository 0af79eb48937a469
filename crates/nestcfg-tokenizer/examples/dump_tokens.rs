use std::io::Read;

use nestcfg_tokenizer::{BufferTokenizer, BufferedTokenizer};

fn main() -> std::io::Result<()> {
    let mut source = String::new();
    std::io::stdin().read_to_string(&mut source)?;

    println!("=== Tokens ===");
    let mut tokenizer = BufferTokenizer::complete(&source);
    loop {
        let token = tokenizer.next_token();
        println!("{token:?}");
        if token.is_terminal() {
            break;
        }
    }

    println!("\n=== Folded ===");
    for token in BufferedTokenizer::new(source.as_bytes()) {
        println!("{token:?}");
    }
    Ok(())
}

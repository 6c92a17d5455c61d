// End-to-end scenarios over the miner/SPV/chain stack. Scenarios 2 and 4
// drive real loopback sockets through `serve`; the rest exercise the
// library directly, since they don't need a wire in the middle to be
// meaningful.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nova_protocol::adversary::{DoubleSpendMiner, DoubleSpendMode};
use nova_protocol::block::{Block, MiningControl};
use nova_protocol::chain::Chain;
use nova_protocol::config::REWARD;
use nova_protocol::crypto::NovaKeypair;
use nova_protocol::miner::{Miner, MinerNode};
use nova_protocol::net::{serve, NetNode, NodeRole, PeerRecord};
use nova_protocol::spv::SpvClient;
use nova_protocol::transaction::Transaction;

fn peer_record_of(net: &NetNode) -> PeerRecord {
    net.self_record()
}

fn spawn_listener<T, F>(node: Arc<T>, port: u16, dispatch: F)
where
    T: Send + Sync + 'static,
    F: Fn(&T, nova_protocol::net::Frame, std::net::TcpStream) + Send + Sync + 'static,
{
    thread::spawn(move || {
        let _ = serve(port, move |frame, stream| dispatch(&node, frame, stream));
    });
    thread::sleep(Duration::from_millis(50));
}

// Scenario 1: single miner, single block, from genesis, no pending
// transactions.
#[test]
fn scenario_1_single_miner_single_block() {
    let miner = Miner::new(NovaKeypair::generate());
    let block = miner.create_block().unwrap().expect("mining never cancelled here");

    assert_eq!(block.transactions.len(), 1);
    let coinbase = Transaction::from_json(&block.transactions[0]).unwrap();
    assert_eq!(coinbase.sender, miner.public_key().to_hex());
    assert_eq!(coinbase.receiver, miner.public_key().to_hex());
    assert_eq!(coinbase.amount, REWARD as i64);

    assert_eq!(miner.balance().unwrap(), REWARD as i64);
    assert_eq!(miner.chain().read().tips().len(), 1);
    assert_eq!(*miner.chain().read().tips().values().next().unwrap(), 1);
}

// Scenario 2: two miners race from genesis over real sockets; after both
// publish, `resolve()` picks exactly one winner deterministically, and the
// loser's block survives in the store but drops out of `tips` once the
// chain grows past it.
#[test]
fn scenario_2_two_miner_race() {
    let a = Arc::new(MinerNode::new(NovaKeypair::generate(), 19101));
    let b = Arc::new(MinerNode::new(NovaKeypair::generate(), 19102));

    spawn_listener(Arc::clone(&a), 19101, |node, frame, stream| node.handle_frame(frame, stream));
    spawn_listener(Arc::clone(&b), 19102, |node, frame, stream| node.handle_frame(frame, stream));

    // Mine independently from genesis first, with neither aware of the
    // other yet, so this is a genuine race rather than one node extending
    // the other's already-known block.
    let block_a = a.create_and_broadcast().unwrap().expect("a mines a block");
    let block_b = b.create_and_broadcast().unwrap().expect("b mines a block");

    // Only now do they learn of each other and publish what they already
    // mined, exactly as two miners racing and then both broadcasting would.
    a.net().add_peer(peer_record_of(b.net()));
    b.net().add_peer(peer_record_of(a.net()));
    a.net().broadcast(&nova_protocol::net::Frame::new(
        nova_protocol::net::Tag::Block,
        &nova_protocol::net::wire::BlockBody { blk_json: block_a.to_json() },
    ));
    b.net().broadcast(&nova_protocol::net::Frame::new(
        nova_protocol::net::Tag::Block,
        &nova_protocol::net::wire::BlockBody { blk_json: block_b.to_json() },
    ));
    thread::sleep(Duration::from_millis(100));

    // Both nodes should now know both blocks, and agree on the same winner
    // (P10: resolve determinism given identical blocks/tips).
    let chain_a = a.miner().chain().read();
    let chain_b = b.miner().chain().read();
    assert!(chain_a.get(&block_a.header.hash()).is_some());
    assert!(chain_a.get(&block_b.header.hash()).is_some());
    assert_eq!(chain_a.resolve(), chain_b.resolve());

    let loser_hash =
        if chain_a.resolve() == block_a.header.hash() { block_b.header.hash() } else { block_a.header.hash() };
    // The losing block is retained in the store...
    assert!(chain_a.get(&loser_hash).is_some());
    drop(chain_a);
    drop(chain_b);

    // ...but drops out of tips once a further block extends the winner.
    let _ = a.create_and_broadcast().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(!a.miner().chain().read().tips().contains_key(&loser_hash));
}

// Scenario 3: simple transfer. A mines a coinbase-only block for 100, then
// pays B 50; A mines again including that transfer.
#[test]
fn scenario_3_simple_transfer() {
    let a = Miner::new(NovaKeypair::generate());
    let b = NovaKeypair::generate();

    a.create_block().unwrap().unwrap();
    assert_eq!(a.balance().unwrap(), REWARD as i64);

    let tx = Transaction::new(a.keypair(), &b.public_key(), 50, "").unwrap();
    a.add_transaction(tx.to_json()).unwrap();

    let block = a.create_block().unwrap().unwrap();
    assert!(block.transactions.iter().any(|t| t == &tx.to_json()));

    assert_eq!(a.balance().unwrap(), 50 + REWARD as i64);
    assert_eq!(a.balance_of(&b.public_key().to_hex()).unwrap(), 50);
}

// Scenario 4: an SPV client's own transaction gets mined by a real miner
// over loopback sockets, and the client's quorum-verified Merkle proof
// comes back true.
#[test]
fn scenario_4_spv_proof() {
    let miner = Arc::new(MinerNode::new(NovaKeypair::generate(), 19111));
    let spv = Arc::new(SpvClient::new(NovaKeypair::generate(), 19112));

    spawn_listener(Arc::clone(&miner), 19111, |node, frame, stream| node.handle_frame(frame, stream));
    spawn_listener(Arc::clone(&spv), 19112, |node, frame, stream| node.handle_frame(frame, stream));

    miner.net().add_peer(peer_record_of(spv.net()));
    spv.net().add_peer(peer_record_of(miner.net()));

    // Fund the SPV client first so its own transfer has balance to spend.
    let seed = Transaction::new(miner.miner().keypair(), &spv.public_key(), 10, "").unwrap();
    miner.miner().add_transaction(seed.to_json()).unwrap();
    miner.create_and_broadcast().unwrap().unwrap();
    thread::sleep(Duration::from_millis(100));

    let receiver = NovaKeypair::generate().public_key();
    let tx = spv.create_transaction(&receiver, 5, "").unwrap();
    thread::sleep(Duration::from_millis(100));

    miner.create_and_broadcast().unwrap().unwrap();
    thread::sleep(Duration::from_millis(100));

    let tx_hash = nova_protocol::crypto::sha256_hex(tx.to_json().as_bytes());
    assert!(spv.verify_transaction_proof(&tx_hash).unwrap());
}

// Scenario 5: build a 7-block honest chain from genesis and a 4-block fork
// off block 3; resolve must pick the longer fork, and both are retained.
#[test]
fn scenario_5_fork_resolution() {
    let mut chain = Chain::new();
    let miner = NovaKeypair::generate();
    let control = MiningControl::new();

    let mine = |prev: &str| {
        let coinbase = Block::coinbase_for(&miner).to_json();
        Block::mine(prev.to_string(), vec![coinbase], &control).unwrap().unwrap()
    };

    let mut main_hashes = vec![chain.genesis_hash().to_string()];
    for _ in 0..7 {
        let block = mine(main_hashes.last().unwrap());
        let hash = block.header.hash();
        chain.add(block).unwrap();
        main_hashes.push(hash);
    }
    let main_tip = main_hashes.last().unwrap().clone();

    // Fork off the 3rd block (index 3 in main_hashes, since index 0 is
    // genesis) with 4 blocks, tying the main chain's length.
    let fork_base = main_hashes[3].clone();
    let mut fork_tip = fork_base.clone();
    for _ in 0..4 {
        let block = mine(&fork_tip);
        let hash = block.header.hash();
        chain.add(block).unwrap();
        fork_tip = hash;
    }

    assert_eq!(chain.tips().len(), 2);
    assert_eq!(*chain.tips().get(&main_tip).unwrap(), 7);
    assert_eq!(*chain.tips().get(&fork_tip).unwrap(), 7);

    let resolved = chain.resolve().to_string();
    assert!(resolved == main_tip || resolved == fork_tip);
    // Both forks are fully retained regardless of which one resolves.
    assert!(chain.blocks_on_fork(&main_tip).unwrap().len() == 7);
    assert!(chain.blocks_on_fork(&fork_tip).unwrap().len() == 4 + 3);
}

// Scenario 6: the double-spend miner's Init -> Fork -> Fire -> publish
// state machine, driven directly (not raced over real threads, since the
// race itself is a probabilistic property, not a deterministic one).
#[test]
fn scenario_6_double_spend_state_machine() {
    let x = DoubleSpendMiner::new(NovaKeypair::generate(), 19121);
    let colluder = NovaKeypair::generate();
    let vendor = NovaKeypair::generate();

    x.net().add_peer(PeerRecord {
        address: ("127.0.0.1".to_string(), 19122),
        pubkey: colluder.public_key().to_hex(),
        name: "colluder".to_string(),
        role: NodeRole::DoubleSpendSpvClient,
    });
    x.net().add_peer(PeerRecord {
        address: ("127.0.0.1".to_string(), 19123),
        pubkey: vendor.public_key().to_hex(),
        name: "vendor".to_string(),
        role: NodeRole::Vendor,
    });

    assert_eq!(x.mode(), DoubleSpendMode::Init);

    // X pays the colluder: this is the foreign block that flips Init -> Fork.
    let funding = Transaction::new(x.miner().keypair(), &colluder.public_key(), 50, "").unwrap();
    let control = MiningControl::new();
    let block = Block::mine(
        x.miner().chain().read().genesis_hash().to_string(),
        vec![Block::coinbase_for(x.miner().keypair()).to_json(), funding.to_json()],
        &control,
    )
    .unwrap()
    .unwrap();
    x.handle_foreign_block(&block.to_json()).unwrap();
    assert_eq!(x.mode(), DoubleSpendMode::Fork);

    // The colluder's purchase from the vendor must be excluded from X's
    // own mempool view while forked.
    let purchase = Transaction::new(&colluder, &vendor.public_key(), 50, "purchase").unwrap();
    x.handle_foreign_transaction(purchase.to_json());

    // The refund from the colluder back to X flips Fork -> Fire.
    let refund = Transaction::new(&colluder, &x.miner().public_key(), 50, "refund").unwrap();
    x.handle_foreign_transaction(refund.to_json());
    assert_eq!(x.mode(), DoubleSpendMode::Fire);

    // X mines privately until its withheld lead overtakes the public
    // chain, then auto-publishes and resets to Init.
    x.create_block().unwrap();
    assert_eq!(x.mode(), DoubleSpendMode::Init);
    assert_eq!(x.withheld_len(), 0);
}

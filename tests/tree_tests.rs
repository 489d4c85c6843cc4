use ecotype::EcotypeError;
use ecotype::divergence::{DivergenceSource, PatristicDivergence};
use ecotype::model::{BranchLength, Tree};
use ecotype::newick::parse_str;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_building_tree() {
    let mut tree = Tree::new();
    let index_l1 = tree.add_leaf("L1".to_string(), BranchLength::new(1.0));
    let index_l2 = tree.add_leaf("L2".to_string(), BranchLength::new(1.0));
    let index_l3 = tree.add_leaf("L3".to_string(), BranchLength::new(0.5));
    let index_i1 = tree.add_internal(vec![index_l1, index_l2], BranchLength::new(1.5));
    let index_root = tree.add_internal(vec![index_l3, index_i1], BranchLength::ZERO);
    tree.set_root(index_root);

    // Counts
    assert_eq!(tree.num_leaves(), 3);
    assert_eq!(tree.num_internal(), 2);
    assert_eq!(tree.num_nodes(), 5);
    assert!(tree.is_valid());

    // Root
    let root = tree.root();
    assert_eq!(root.index(), index_root);
    assert!(!root.has_parent());

    // Leaf
    let l2 = &tree[index_l2];
    assert!(l2.is_leaf());
    assert_eq!(l2.name(), "L2");
    assert_eq!(l2.parent(), Some(index_i1));

    // Internal
    let i1 = &tree[index_i1];
    assert!(i1.is_internal());
    assert_eq!(i1.branch_length(), BranchLength::new(1.5));
    assert_eq!(i1.children(), &[index_l1, index_l2]);

    assert_eq!(tree.to_newick(), "(L3:0.5,(L1:1,L2:1):1.5);");
}

#[test]
#[should_panic]
fn test_get_root_panics_on_empty_tree() {
    let tree = Tree::new();
    tree.root(); // Should panic
}

#[test]
#[should_panic]
fn test_get_node_out_of_bounds() {
    let tree = parse_str("(A,B);").unwrap();
    let _ = &tree[55];
}

#[test]
#[should_panic]
fn test_negative_branch_length_panics() {
    BranchLength::new(-1.0);
}

#[test]
fn test_invalid_trees() {
    assert!(!Tree::new().is_valid());

    let mut tree = Tree::new();
    let a = tree.add_leaf("A".to_string(), BranchLength::ZERO);
    let root = tree.add_internal(vec![a], BranchLength::ZERO);
    tree.set_root(root);
    // Only one leaf
    assert!(!tree.is_valid());
}

// --- QUERIES ---
#[test]
fn test_leaves_in_order() {
    let tree = parse_str("((A:1,(B:1,C:1):1):1,(D:1,E:1):1,F:1);").unwrap();
    assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "D", "E", "F"]);

    let first_clade = tree.root().children()[0];
    assert_eq!(tree.descendant_leaf_names(first_clade), vec!["A", "B", "C"]);
    let f = tree.find_leaf("F").unwrap();
    assert_eq!(tree.descendant_leaf_names(f), vec!["F"]);
    assert_eq!(tree.find_leaf("G"), None);
}

#[test]
fn test_distances() {
    let tree = parse_str("((A:1,B:2):3,(C:4,D:5):6);").unwrap();
    let a = tree.find_leaf("A").unwrap();
    let b = tree.find_leaf("B").unwrap();
    let d = tree.find_leaf("D").unwrap();

    assert_close(tree.depth_of(a), 4.0);
    assert_close(tree.depth_of(tree.root_index()), 0.0);
    assert_close(tree.max_leaf_distance(tree.root_index()), 11.0);
    assert_close(tree.max_leaf_distance(a), 0.0);
    assert_close(tree.patristic_distance(a, b), 3.0);
    assert_close(tree.patristic_distance(a, d), 15.0);
    assert_close(tree.patristic_distance(d, d), 0.0);
}

#[test]
fn test_iterators() {
    let tree = parse_str("(A:0.1,(B:0.05,C:0.02):0.03);").unwrap();

    let pre_order: Vec<&str> = tree.pre_order_iter().map(|n| n.name()).collect();
    assert_eq!(pre_order, vec!["", "A", "", "B", "C"]);

    let post_order: Vec<&str> = tree.post_order_iter().map(|n| n.name()).collect();
    assert_eq!(post_order, vec!["A", "B", "C", "", ""]);
    assert_eq!(
        tree.post_order_iter().last().unwrap().index(),
        tree.root_index()
    );
}

// --- REROOTING ---
#[test]
fn test_reroot_at_root_child() {
    let mut tree = parse_str("(A:0.1,(B:0.05,C:0.02):0.03);").unwrap();
    assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);

    tree.reroot("A").unwrap();
    assert!(tree.to_newick().starts_with("(A:"));
    assert_eq!(tree.to_newick(), "(A:0.1,(B:0.05,C:0.02):0.03);");

    let mut tree = parse_str("((B:0.05,C:0.02):0.03,A:0.1);").unwrap();
    tree.reroot("A").unwrap();
    assert_eq!(tree.to_newick(), "(A:0.1,(B:0.05,C:0.02):0.03);");
}

#[test]
fn test_reroot_deep_leaf() {
    let mut tree = parse_str("((A:1,B:2):3,(C:4,D:5):6);").unwrap();
    tree.reroot("C").unwrap();

    assert!(tree.is_valid());
    assert_eq!(tree.to_newick(), "(C:2,(D:5,(A:1,B:2):9):2);");
    let root = tree.root();
    assert_eq!(root.children().len(), 2);
    assert_eq!(tree[root.children()[0]].name(), "C");
}

#[test]
fn test_reroot_preserves_patristic_distances() {
    let newick = "(((A:0.1,B:0.2):0.05,C:0.3):0.1,(D:0.15,(E:0.05,F:0.07):0.02):0.2,G:0.4);";
    let original = parse_str(newick).unwrap();
    let before = PatristicDivergence::new(&original);

    for outgroup in ["A", "C", "E", "G"] {
        let mut tree = original.clone();
        tree.reroot(outgroup).unwrap();
        assert!(tree.is_valid());
        assert_eq!(tree.num_leaves(), 7);
        assert_eq!(tree[tree.root().children()[0]].name(), outgroup);

        let after = PatristicDivergence::new(&tree);
        let names = original.leaf_names();
        for a in &names {
            for b in &names {
                assert_close(
                    after.divergence(a, b).unwrap(),
                    before.divergence(a, b).unwrap(),
                );
            }
        }
    }
}

#[test]
fn test_reroot_unknown_leaf() {
    let mut tree = parse_str("(A:1,B:1);").unwrap();
    assert!(matches!(tree.reroot("Z"), Err(EcotypeError::NotFound(name)) if name == "Z"));
}

// --- SORTING ---
#[test]
fn test_sort_children_deepest_first() {
    let mut tree = parse_str("((A:1,B:2):3,(C:4,D:5):6);").unwrap();
    tree.sort_children();
    assert_eq!(tree.to_newick(), "((D:5,C:4):6,(B:2,A:1):3);");
}

#[test]
fn test_sort_children_ties_by_name() {
    let mut first = parse_str("((C:1,D:1):1,(A:1,B:1):1);").unwrap();
    let mut second = parse_str("((B:1,A:1):1,(D:1,C:1):1);").unwrap();
    first.sort_children();
    second.sort_children();
    assert_eq!(first.to_newick(), "((A:1,B:1):1,(C:1,D:1):1);");
    assert_eq!(first.to_newick(), second.to_newick());
}

#[test]
fn test_sort_children_by_comparator() {
    let mut tree = parse_str("((A:1,B:1,C:1):1,D:1,(E:1,F:1):1);").unwrap();
    // Most leaves first
    tree.sort_children_by(|tree, a, b| {
        tree.descendant_leaves(b)
            .len()
            .cmp(&tree.descendant_leaves(a).len())
    });
    assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "E", "F", "D"]);
}

// --- PRUNING ---
#[test]
fn test_remove_leaf() {
    let mut tree = parse_str("((A:1,B:2):3,C:4);").unwrap();
    let b = tree.remove_leaf("B").unwrap();

    assert!(!tree[b].has_parent());
    assert_eq!(tree.leaf_names(), vec!["A", "C"]);
    assert_eq!(tree.num_leaves(), 2);
    assert_eq!(tree.find_leaf("B"), None);
    assert!(tree.is_valid());

    assert!(matches!(tree.remove_leaf("B"), Err(EcotypeError::NotFound(_))));
}
